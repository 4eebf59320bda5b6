//! Session boundaries: token storage backends and the login navigator.
//!
//! The client never mints credentials. A login flow external to this crate
//! writes the token; the client reads it before every outbound request and
//! clears it when the backend answers 401. [`Navigator`] models the forced
//! redirect to the login entry point that accompanies that clear.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::_prelude::*;

/// Fixed key the token is persisted under by [`FileTokenStore`], mirroring the
/// storage slot login flows write.
pub const TOKEN_KEY: &str = "token";

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Credential storage consulted before every outbound request.
///
/// Login and logout flows own writes. The client only reads the token to build
/// the authorization header and clears it on HTTP 401; that clear must never
/// fail, so [`TokenStore::clear`] is best-effort by contract. Implementations
/// must tolerate concurrent access.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the stored token, if any.
	fn token(&self) -> Option<String>;

	/// Stores or replaces the token.
	fn store(&self, token: &str) -> Result<(), SessionError>;

	/// Clears the stored token.
	fn clear(&self);
}

/// Navigation sink the client points at the login path when credentials expire.
///
/// Modeled as an external side-effecting service: the client calls it exactly
/// once per 401 and never inspects the outcome.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Issues a hard navigation to `path`.
	fn navigate(&self, path: &str);
}

/// Navigation sink that records every redirect, for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct RecordingNavigator(Arc<Mutex<Vec<String>>>);
impl RecordingNavigator {
	/// Returns the redirect targets recorded so far.
	pub fn recorded(&self) -> Vec<String> {
		self.0.lock().clone()
	}
}
impl Navigator for RecordingNavigator {
	fn navigate(&self, path: &str) {
		self.0.lock().push(path.to_owned());
	}
}

/// Thread-safe in-process token store for tests, demos, and short-lived tools.
#[derive(Clone, Default)]
pub struct MemoryTokenStore(Arc<RwLock<Option<String>>>);
impl MemoryTokenStore {
	/// Creates a store pre-populated with a token.
	pub fn with_token(token: impl Into<String>) -> Self {
		Self(Arc::new(RwLock::new(Some(token.into()))))
	}
}
impl TokenStore for MemoryTokenStore {
	fn token(&self) -> Option<String> {
		self.0.read().clone()
	}

	fn store(&self, token: &str) -> Result<(), SessionError> {
		*self.0.write() = Some(token.to_owned());

		Ok(())
	}

	fn clear(&self) {
		*self.0.write() = None;
	}
}
impl Debug for MemoryTokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("MemoryTokenStore")
			.field(&self.0.read().as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Persists the token to a JSON file after each mutation so sessions survive
/// process restarts. The token lives under the fixed [`TOKEN_KEY`] slot.
#[derive(Clone)]
pub struct FileTokenStore {
	path: PathBuf,
	inner: Arc<RwLock<Option<String>>>,
}
impl FileTokenStore {
	/// Opens (or creates) a store at the provided path, eagerly loading any
	/// existing token.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<Option<String>, SessionError> {
		if !path.exists() {
			return Ok(None);
		}

		let bytes = fs::read(path).map_err(|e| SessionError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(None);
		}

		let entries: HashMap<String, String> =
			serde_json::from_slice(&bytes).map_err(|e| SessionError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.get(TOKEN_KEY).cloned())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), SessionError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| SessionError::Backend {
				message: format!("Failed to create session directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, token: Option<&str>) -> Result<(), SessionError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut entries = HashMap::new();

		if let Some(value) = token {
			entries.insert(TOKEN_KEY, value);
		}

		let serialized =
			serde_json::to_vec_pretty(&entries).map_err(|e| SessionError::Serialization {
				message: format!("Failed to serialize session snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| SessionError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| SessionError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| SessionError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| SessionError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStore for FileTokenStore {
	fn token(&self) -> Option<String> {
		self.inner.read().clone()
	}

	fn store(&self, token: &str) -> Result<(), SessionError> {
		let mut guard = self.inner.write();

		*guard = Some(token.to_owned());
		self.persist(Some(token))
	}

	fn clear(&self) {
		let mut guard = self.inner.write();

		*guard = None;

		// The 401 transition must still complete when the disk write fails; the
		// in-memory view is already cleared.
		let _ = self.persist(None);
	}
}
impl Debug for FileTokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FileTokenStore").field("path", &self.path).finish()
	}
}
