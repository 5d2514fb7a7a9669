//! Draft persistence adapters.
//!
//! The draft must survive a page reload, so the store writes through a
//! small key-value adapter holding two logical keys: the draft itself and
//! the one-shot resume flag. The core logic only sees this trait; swapping
//! the backing store never touches the pipeline.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drafts::BookingDraft;

/// Errors surfaced by a persistence adapter.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the backing store failed.
    #[error("draft store io failed")]
    Io(#[from] io::Error),

    /// The stored state could not be encoded or decoded.
    #[error("draft store serialization failed")]
    Serde(#[from] serde_json::Error),
}

/// A reload-surviving key-value store for the draft and resume flag.
pub trait DraftPersistence {
    /// Load the persisted draft, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the backing store cannot be read
    /// or decoded.
    fn load(&self) -> Result<Option<BookingDraft>, PersistenceError>;

    /// Persist `draft`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the backing store cannot be
    /// written.
    fn save(&mut self, draft: &BookingDraft) -> Result<(), PersistenceError>;

    /// Remove the persisted draft. The resume flag is untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the backing store cannot be
    /// written.
    fn clear(&mut self) -> Result<(), PersistenceError>;

    /// Set the one-shot resume flag.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the backing store cannot be
    /// written.
    fn set_resume(&mut self) -> Result<(), PersistenceError>;

    /// Read and clear the one-shot resume flag.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the backing store cannot be read
    /// or written.
    fn take_resume(&mut self) -> Result<bool, PersistenceError>;
}

impl<P: DraftPersistence + ?Sized> DraftPersistence for &mut P {
    fn load(&self) -> Result<Option<BookingDraft>, PersistenceError> {
        (**self).load()
    }

    fn save(&mut self, draft: &BookingDraft) -> Result<(), PersistenceError> {
        (**self).save(draft)
    }

    fn clear(&mut self) -> Result<(), PersistenceError> {
        (**self).clear()
    }

    fn set_resume(&mut self) -> Result<(), PersistenceError> {
        (**self).set_resume()
    }

    fn take_resume(&mut self) -> Result<bool, PersistenceError> {
        (**self).take_resume()
    }
}

/// Volatile adapter for tests and previews. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    draft: Option<BookingDraft>,
    resume: bool,
}

impl DraftPersistence for InMemoryPersistence {
    fn load(&self) -> Result<Option<BookingDraft>, PersistenceError> {
        Ok(self.draft.clone())
    }

    fn save(&mut self, draft: &BookingDraft) -> Result<(), PersistenceError> {
        self.draft = Some(draft.clone());

        Ok(())
    }

    fn clear(&mut self) -> Result<(), PersistenceError> {
        self.draft = None;

        Ok(())
    }

    fn set_resume(&mut self) -> Result<(), PersistenceError> {
        self.resume = true;

        Ok(())
    }

    fn take_resume(&mut self) -> Result<bool, PersistenceError> {
        let resume = self.resume;
        self.resume = false;

        Ok(resume)
    }
}

/// On-disk serialized state: both logical keys live in one JSON document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    draft: Option<BookingDraft>,
    resume: bool,
}

/// File-backed adapter encoding the state as JSON.
#[derive(Debug)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    /// Create an adapter backed by the file at `path`.
    ///
    /// The file is created on first write; a missing file reads as an
    /// absent draft and an unset resume flag.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file backing this adapter.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_state(&self) -> Result<PersistedState, PersistenceError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                Ok(PersistedState::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn write_state(&self, state: &PersistedState) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(state)?;
        fs::write(&self.path, bytes)?;

        Ok(())
    }
}

impl DraftPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<BookingDraft>, PersistenceError> {
        Ok(self.read_state()?.draft)
    }

    fn save(&mut self, draft: &BookingDraft) -> Result<(), PersistenceError> {
        let mut state = self.read_state()?;
        state.draft = Some(draft.clone());

        self.write_state(&state)
    }

    fn clear(&mut self) -> Result<(), PersistenceError> {
        let mut state = self.read_state()?;
        state.draft = None;

        self.write_state(&state)
    }

    fn set_resume(&mut self) -> Result<(), PersistenceError> {
        let mut state = self.read_state()?;
        state.resume = true;

        self.write_state(&state)
    }

    fn take_resume(&mut self) -> Result<bool, PersistenceError> {
        let mut state = self.read_state()?;
        let resume = state.resume;

        if resume {
            state.resume = false;
            self.write_state(&state)?;
        }

        Ok(resume)
    }
}
