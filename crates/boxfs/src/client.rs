//! # Box client
//!
//! Typed proxy for a box canister. Each method is one call through the
//! underlying [`Actor`]; replies are read back into the types of
//! [`crate::types`].

use canister::Actor;
use canister::ActorError;
use canister::Interface;
use canister::Service;
use canister::Value;
use canister::actor;
use canister::idl;

use crate::types;
use crate::types::Directory;
use crate::types::File;
use crate::types::Path;

#[derive(Clone, Debug)]
pub struct BoxFs {
    actor: Actor,
}

impl Service for BoxFs {
    fn interface() -> Interface {
        types::interface()
    }

    fn from_actor(actor: Actor) -> Self {
        Self { actor }
    }
}

impl BoxFs {
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Lists the directory at `path`.
    pub async fn open_directory(&self, path: impl Into<Path>) -> actor::Result<Directory> {
        let reply = self
            .actor
            .call_one("openDirectory", vec![path.into().to_value()])
            .await?;
        decode("openDirectory", Directory::from_value(&reply))
    }

    /// Returns the size and content type of the file at `path`.
    pub async fn open_file(&self, path: impl Into<Path>) -> actor::Result<File> {
        let reply = self
            .actor
            .call_one("openFile", vec![path.into().to_value()])
            .await?;
        decode("openFile", File::from_value(&reply))
    }

    /// Reads `start..end` of a file. Negative bounds count from the end,
    /// `None` means the start or end of the file.
    pub async fn read_file(
        &self,
        path: impl Into<Path>,
        start: Option<i64>,
        end: Option<i64>,
    ) -> actor::Result<Vec<u8>> {
        let reply = self
            .actor
            .call_one(
                "readFile",
                vec![path.into().to_value(), opt_int(start), opt_int(end)],
            )
            .await?;
        decode("readFile", reply.as_blob().map(<[u8]>::to_vec))
    }

    /// Creates the directory at `path` along with any missing parents.
    pub async fn create_directory(&self, path: impl Into<Path>) -> actor::Result<Directory> {
        let reply = self
            .actor
            .call_one("createDirectory", vec![path.into().to_value()])
            .await?;
        decode("createDirectory", Directory::from_value(&reply))
    }

    /// Creates an empty file in an existing directory.
    pub async fn create_file(
        &self,
        path: impl Into<Path>,
        content_type: impl Into<String>,
    ) -> actor::Result<File> {
        let reply = self
            .actor
            .call_one(
                "createFile",
                vec![path.into().to_value(), Value::Text(content_type.into())],
            )
            .await?;
        decode("createFile", File::from_value(&reply))
    }

    /// Writes `data` at `offset` (default 0), growing the file as needed.
    pub async fn write_file(
        &self,
        path: impl Into<Path>,
        data: impl Into<Vec<u8>>,
        offset: Option<i64>,
    ) -> actor::Result<()> {
        self.actor
            .call(
                "writeFile",
                vec![path.into().to_value(), Value::Blob(data.into()), opt_int(offset)],
            )
            .await?;
        Ok(())
    }
}

fn opt_int(value: Option<i64>) -> Value {
    match value {
        Some(n) => Value::some(Value::Int64(n)),
        None => Value::none(),
    }
}

fn decode<T>(method: &str, result: idl::Result<T>) -> actor::Result<T> {
    result.map_err(|error| ActorError::Decode {
        method: method.to_string(),
        error,
    })
}
