// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback address prefixes, so that several clusters can run on one machine.

use crate::errors::AddressPrefixError;
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    ops::RangeInclusive,
};
use tracing::{debug, info, warn};

/// An exclusively held `127.0.N.` address prefix.
///
/// The prefix is released when this is dropped.
#[derive(Debug)]
pub struct AddressPrefixLock {
    prefix: String,
    lock_path: Utf8PathBuf,
}

impl AddressPrefixLock {
    /// Acquires the first free prefix in `range`.
    ///
    /// A prefix is held by creating `lock_dir/127.0.N.lock`; an existing file means another
    /// process holds it.
    pub fn acquire(
        lock_dir: &Utf8Path,
        range: RangeInclusive<u8>,
    ) -> Result<Self, AddressPrefixError> {
        fs::create_dir_all(lock_dir).map_err(|error| AddressPrefixError::LockDirCreate {
            lock_dir: lock_dir.to_owned(),
            error,
        })?;

        for n in range.clone() {
            let prefix = format!("127.0.{n}.");
            let lock_path = lock_dir.join(format!("{prefix}lock"));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    // The owner's pid only helps when cleaning up by hand.
                    if let Err(error) = writeln!(file, "{}", std::process::id()) {
                        debug!("failed to write pid to `{lock_path}`: {error}");
                    }
                    info!("acquired address prefix {prefix}");
                    return Ok(Self { prefix, lock_path });
                }
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("address prefix {prefix} is in use");
                }
                Err(error) => {
                    return Err(AddressPrefixError::LockCreate {
                        path: lock_path,
                        error,
                    });
                }
            }
        }

        Err(AddressPrefixError::Exhausted {
            lock_dir: lock_dir.to_owned(),
            range,
        })
    }

    /// The prefix, e.g. `127.0.1.`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The lock file backing this prefix.
    pub fn lock_path(&self) -> &Utf8Path {
        &self.lock_path
    }
}

impl Drop for AddressPrefixLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.lock_path) {
            Ok(()) => debug!("released address prefix {}", self.prefix),
            Err(error) => warn!(
                "failed to release address prefix {} (lock `{}`): {error}",
                self.prefix, self.lock_path
            ),
        }
    }
}
