//! Loaded banks, looked up by id or name.

use std::path::Path;
use std::sync::Arc;

use crate::bank::Bank;
use crate::error::Result;
use crate::loader::AsyncLoader;

/// Key of a bank in a [`BankRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BankId(u32);

/// Owns the banks of one engine instance together with the loader thread
/// that reads them.
///
/// Destroying a bank (or dropping the registry) stops and detaches every
/// sound built from it.
pub struct BankRegistry {
    banks: Vec<(BankId, Arc<Bank>)>,
    next_id: u32,
    loader: AsyncLoader,
}

impl BankRegistry {
    /// Empty registry with its own loader thread.
    pub fn new() -> Self {
        Self {
            banks: Vec::new(),
            next_id: 0,
            loader: AsyncLoader::new(),
        }
    }

    /// Adds an already created bank.
    pub fn insert(&mut self, bank: Arc<Bank>) -> BankId {
        let id = BankId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.banks.push((id, bank));
        id
    }

    /// Loads a bank file region synchronously.
    pub fn load(&mut self, path: impl AsRef<Path>, offset: i64, length: i64) -> Result<BankId> {
        let path = path.as_ref();
        match Bank::load(path, offset, length) {
            Ok(bank) => Ok(self.insert(bank)),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "bank could not be loaded");
                Err(e)
            }
        }
    }

    /// Starts loading a bank file region in the background.
    pub fn load_async(&mut self, path: impl AsRef<Path>, offset: i64, length: i64) -> Result<BankId> {
        let bank = Bank::load_async(&self.loader, path, offset, length)?;
        Ok(self.insert(bank))
    }

    /// Adds a bank parsed from an in-memory image.
    pub fn load_bytes(&mut self, bytes: Vec<u8>) -> Result<BankId> {
        Ok(self.insert(Bank::from_bytes(bytes)?))
    }

    /// Bank registered under `id`.
    pub fn get(&self, id: BankId) -> Option<&Arc<Bank>> {
        self.banks.iter().find(|(i, _)| *i == id).map(|(_, b)| b)
    }

    /// First loaded bank named `name`.
    pub fn find(&self, name: &str) -> Option<BankId> {
        let found = self
            .banks
            .iter()
            .find(|(_, bank)| bank.name() == Some(name))
            .map(|(id, _)| *id);
        if found.is_none() {
            tracing::info!(name, "could not find bank");
        }
        found
    }

    /// First loaded bank holding a sample named `name`, with the sample's
    /// index.
    pub fn find_sample(&self, name: &str) -> Option<(Arc<Bank>, usize)> {
        self.banks
            .iter()
            .find_map(|(_, bank)| bank.find_sound(name).map(|index| (Arc::clone(bank), index)))
    }

    /// Removes a bank and unloads every sound built from it. A bank still
    /// loading is waited for first.
    pub fn destroy(&mut self, id: BankId) -> bool {
        let Some(pos) = self.banks.iter().position(|(i, _)| *i == id) else {
            return false;
        };
        let (_, bank) = self.banks.remove(pos);
        bank.wait();
        bank.unload_sounds();
        true
    }

    /// Destroys every bank.
    pub fn destroy_all(&mut self) {
        for (_, bank) in self.banks.drain(..) {
            bank.wait();
            bank.unload_sounds();
        }
    }

    /// Registered banks, loaded or not.
    pub fn len(&self) -> usize {
        self.banks.len()
    }

    /// Whether no bank is registered.
    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = BankId> + '_ {
        self.banks.iter().map(|(id, _)| *id)
    }

    /// Loader thread used by [`load_async`](Self::load_async).
    pub fn loader(&self) -> &AsyncLoader {
        &self.loader
    }
}

impl Default for BankRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BankRegistry {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
