use std::{sync::Mutex, time::Duration};

use redis::{Client, Commands, Connection, RedisError, RedisResult};
use tracing::{debug, instrument, warn};

use super::{Store, StoreError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

fn backend(e: RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// [`Store`] kept in Redis, so users and games outlive the process.
///
/// One connection is opened lazily and reused; a connection that fails at
/// the I/O level is dropped and reopened on the next call.
pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<Connection>>,
}

impl RedisStore {
    /// Parses the URL. No connection is made until the first command.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(backend)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    fn run<T>(
        &self,
        command: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> Result<T, StoreError> {
        let mut slot = self
            .connection
            .lock()
            .map_err(|_| StoreError::Backend("redis connection lock poisoned".into()))?;

        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => {
                debug!("Opening redis connection");
                self.client
                    .get_connection_with_timeout(CONNECT_TIMEOUT)
                    .map_err(backend)?
            }
        };

        match command(&mut connection) {
            Ok(value) => {
                *slot = Some(connection);
                Ok(value)
            }
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() {
                    warn!("Dropping redis connection: {}", e);
                } else {
                    *slot = Some(connection);
                }
                Err(backend(e))
            }
        }
    }
}

impl Store for RedisStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.run(|connection| connection.get(key))
    }

    #[instrument(level = "trace", skip(self, value), fields(bytes = value.len()))]
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.run(|connection| connection.set(key, value))
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.run(|connection| connection.exists(key))
    }

    #[instrument(level = "trace", skip(self))]
    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed: i64 = self.run(|connection| connection.del(key))?;
        Ok(removed > 0)
    }
}
