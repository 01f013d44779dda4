use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use delocalise_lib::auth::AuthorizationSurface;
use delocalise_lib::background::{self, BackgroundHandle};
use delocalise_lib::infra::settings::AppSettings;
use delocalise_lib::test_support::{FakeSurface, FakeTransport, FakeVerifier};
use delocalise_lib::{AppState, BackgroundParts};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn save_once(&mut self, key: &'static str) {
        if self.saved.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.saved.push((key, std::env::var_os(key)));
    }

    fn set_var(&mut self, key: &'static str, value: impl Into<OsString>) {
        self.save_once(key);
        std::env::set_var(key, value.into());
    }

    fn remove_var(&mut self, key: &'static str) {
        self.save_once(key);
        std::env::remove_var(key);
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Isolated data directory: `DELOCALISE_HOME` points at a fresh temp dir for the test's lifetime.
pub struct TestHome {
    _lock: MutexGuard<'static, ()>,
    env: EnvRestore,
    home: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        let lock = env_lock();
        let home = tempfile::tempdir().expect("tempdir");

        let mut env = EnvRestore::default();
        env.set_var(
            delocalise_lib::infra::app_paths::HOME_ENV_VAR,
            home.path().as_os_str().to_os_string(),
        );
        env.remove_var(delocalise_lib::infra::settings::CLIENT_ID_ENV_VAR);

        Self {
            _lock: lock,
            env,
            home,
        }
    }

    #[allow(dead_code)]
    pub fn set_client_id(&mut self, value: &str) {
        self.env
            .set_var(delocalise_lib::infra::settings::CLIENT_ID_ENV_VAR, value);
    }

    pub fn home_dir(&self) -> &std::path::Path {
        self.home.path()
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}

/// Background service wired with fakes: silent and interactive handshakes both grant a token.
#[allow(dead_code)]
pub async fn spawn_background(
    transport: Arc<FakeTransport>,
) -> (BackgroundHandle, AppState, Arc<FakeSurface>) {
    let surface = Arc::new(FakeSurface::granting("fresh-token", 3600));
    let settings = AppSettings {
        client_id: "integration-client".to_string(),
        ..AppSettings::default()
    };
    let parts = BackgroundParts {
        surface: Arc::clone(&surface) as Arc<dyn AuthorizationSurface>,
        verifier: Arc::new(FakeVerifier::accepting()),
        transport,
    };
    let state = AppState::build(&settings, None, parts)
        .await
        .expect("build app state");
    let (handle, _task) = background::service::spawn(Arc::clone(state.context()));
    (handle, state, surface)
}

#[allow(dead_code)]
pub fn loopback_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build client")
}
