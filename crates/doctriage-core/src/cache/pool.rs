//! Small fixed-size SQLite connection pool.
//!
//! Connections are acquired with scoped guards: a [`PooledConn`] returns
//! its connection to the free list on drop, on every exit path. A tokio
//! semaphore bounds concurrent holders, so workers queue instead of
//! opening ad hoc connections.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::Result;

/// A fixed-size pool of SQLite connections to one database file.
#[derive(Debug)]
pub(crate) struct ConnectionPool {
    semaphore: Semaphore,
    free: Mutex<Vec<Connection>>,
}

impl ConnectionPool {
    /// Open `size` connections to the database at `path`.
    pub(crate) fn open(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let size = size.max(1);
        let mut free = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open(&path)?;
            // Writes from concurrent workers contend; let SQLite wait
            // instead of failing immediately with SQLITE_BUSY.
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            free.push(conn);
        }
        Ok(Self {
            semaphore: Semaphore::new(size),
            free: Mutex::new(free),
        })
    }

    /// Acquire a connection, waiting for a free slot if necessary.
    pub(crate) async fn acquire(&self) -> PooledConn<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("pool semaphore closed");
        let conn = self
            .free
            .lock()
            .expect("pool lock poisoned")
            .pop()
            .expect("permit held but no free connection");
        PooledConn {
            pool: self,
            conn: Some(conn),
            _permit: permit,
        }
    }
}

/// Scoped connection guard. Dereferences to [`Connection`] and returns it
/// to the pool on drop.
pub(crate) struct PooledConn<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
    _permit: SemaphorePermit<'a>,
}

impl Deref for PooledConn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already returned")
    }
}

impl DerefMut for PooledConn<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already returned")
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool
                .free
                .lock()
                .expect("pool lock poisoned")
                .push(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connections_are_returned_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("pool.db"), 2).unwrap();

        {
            let _a = pool.acquire().await;
            let _b = pool.acquire().await;
        }
        // Both slots free again; two more acquisitions must not block.
        let _c = pool.acquire().await;
        let _d = pool.acquire().await;
    }

    #[tokio::test]
    async fn pool_size_is_at_least_one() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("pool.db"), 0).unwrap();
        let conn = pool.acquire().await;
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
    }
}
