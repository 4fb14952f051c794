//! File-backed [`HintStore`] so a login completed by one part of the application survives a
//! reload of another.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{HintError, HintFuture, HintStore, LoginHint},
};

/// Persists the login hint as a small JSON document, replacing it atomically on each write.
#[derive(Clone, Debug)]
pub struct FileHintStore {
	path: PathBuf,
	lock: Arc<Mutex<()>>,
}
impl FileHintStore {
	/// Opens a store at `path`, creating the parent directory if needed.
	///
	/// The file itself is only created by the first [`HintStore::mark_login_completed`].
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, HintError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		Ok(Self { path, lock: Default::default() })
	}

	/// Location of the hint document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), HintError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| HintError::Backend {
				message: format!("Failed to create hint directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn load(&self) -> Result<Option<LoginHint>, HintError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(HintError::Backend {
					message: format!("Failed to read {}: {e}", self.path.display()),
				}),
		};

		if bytes.is_empty() {
			return Ok(None);
		}

		serde_json::from_slice(&bytes).map(Some).map_err(|e| HintError::Serialization {
			message: format!("Failed to parse {}: {e}", self.path.display()),
		})
	}

	fn persist(&self, hint: &LoginHint) -> Result<(), HintError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec(hint).map_err(|e| HintError::Serialization {
			message: format!("Failed to serialize login hint: {e}"),
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| HintError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| HintError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| HintError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| HintError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn remove(&self) -> Result<(), HintError> {
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(HintError::Backend {
				message: format!("Failed to remove {}: {e}", self.path.display()),
			}),
		}
	}
}
impl HintStore for FileHintStore {
	fn mark_login_completed(&self, hint: LoginHint) -> HintFuture<'_, ()> {
		Box::pin(async move {
			let _guard = self.lock.lock();

			self.persist(&hint)
		})
	}

	fn take_login_completed(&self) -> HintFuture<'_, Option<LoginHint>> {
		Box::pin(async move {
			let _guard = self.lock.lock();
			let hint = self.load()?;

			if hint.is_some() {
				self.remove()?;
			}

			Ok(hint)
		})
	}

	fn clear(&self) -> HintFuture<'_, ()> {
		Box::pin(async move {
			let _guard = self.lock.lock();

			self.remove()
		})
	}
}
