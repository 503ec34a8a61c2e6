use super::*;
use crate::checksum::{Algorithm, ContentHash, Hasher};
use crate::fetch::CurlFetcher;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// Serves a fixed body for any URL and counts calls.
struct StaticFetcher {
    body: Vec<u8>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    fn new(body: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, _url: &Url, out: &mut dyn Write, out_label: &Path) -> Result<u64, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        out.write_all(&self.body)
            .map_err(|e| Error::permission(out_label, e))?;
        Ok(self.body.len() as u64)
    }
}

fn sha256(data: &[u8]) -> ContentHash {
    let mut h = Hasher::new(Algorithm::Sha256);
    h.update(data);
    ContentHash::new(Algorithm::Sha256, &h.finalize_hex()).unwrap()
}

fn current_env(home: &Path) -> Environment {
    // SAFETY: getuid/getgid cannot fail.
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    Environment {
        home: home.to_path_buf(),
        user: uid.to_string(),
        group: gid.to_string(),
    }
}

fn part_files(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(rd) => rd
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().ends_with(".part"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn first_install_then_unchanged() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let body = b"git plugin 1.0";
    let fetcher = StaticFetcher::new(body);
    let installer = Installer::new(fetcher.clone());
    let spec = PluginSpec::new("git", "https://example/git-plugin-1.0.hpi", sha256(body));

    let first = installer.ensure_installed(&spec, &env).unwrap();
    let dest = home.path().join("plugins/git-plugin-1.0.hpi");
    assert_eq!(
        first,
        InstallOutcome::Installed {
            destination: dest.clone(),
            replaced: false,
            bytes: body.len() as u64,
        }
    );
    assert!(first.requires_restart());
    assert_eq!(fs::read(&dest).unwrap(), body);

    let second = installer.ensure_installed(&spec, &env).unwrap();
    assert_eq!(second, InstallOutcome::Unchanged { destination: dest });
    assert!(!second.is_changed());
    assert!(!second.requires_restart());
    assert_eq!(fetcher.calls(), 1, "second call must not fetch");
}

#[test]
fn installed_file_has_requested_ownership() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let body = b"credentials";
    let installer = Installer::new(StaticFetcher::new(body));
    let spec = PluginSpec::new("credentials", "https://example/credentials.hpi", sha256(body));

    let out = installer.ensure_installed(&spec, &env).unwrap();
    let meta = fs::metadata(out.destination()).unwrap();
    let want = Ownership::resolve(&env.user, &env.group, out.destination()).unwrap();
    assert_eq!(Ownership::of_metadata(&meta), want);
}

#[test]
fn stale_file_is_replaced() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let dest_dir = home.path().join("plugins");
    fs::create_dir_all(&dest_dir).unwrap();
    fs::write(dest_dir.join("git.hpi"), b"old version").unwrap();

    let body = b"new version";
    let installer = Installer::new(StaticFetcher::new(body));
    let spec = PluginSpec::new("git", "https://example/git.hpi", sha256(body));

    let out = installer.ensure_installed(&spec, &env).unwrap();
    assert!(matches!(out, InstallOutcome::Installed { replaced: true, .. }));
    assert_eq!(fs::read(dest_dir.join("git.hpi")).unwrap(), body);
    assert!(part_files(&dest_dir).is_empty());
}

#[test]
fn hash_mismatch_keeps_prior_file() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let dest_dir = home.path().join("plugins");
    fs::create_dir_all(&dest_dir).unwrap();
    fs::write(dest_dir.join("git.hpi"), b"prior").unwrap();

    let installer = Installer::new(StaticFetcher::new(b"tampered"));
    let spec = PluginSpec::new("git", "https://example/git.hpi", sha256(b"genuine"));

    let err = installer.ensure_installed(&spec, &env).unwrap_err();
    match &err {
        Error::HashMismatch { expected, actual, .. } => {
            assert_eq!(expected, &sha256(b"genuine").to_string());
            assert_eq!(actual, &sha256(b"tampered").to_string());
        }
        other => panic!("expected HashMismatch, got {other:?}"),
    }
    assert_eq!(fs::read(dest_dir.join("git.hpi")).unwrap(), b"prior");
    assert!(part_files(&dest_dir).is_empty());
}

#[test]
fn hash_mismatch_on_fresh_install_leaves_nothing() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let installer = Installer::new(StaticFetcher::new(b"tampered"));
    let spec = PluginSpec::new("git", "https://example/git.hpi", sha256(b"genuine"));

    assert!(installer.ensure_installed(&spec, &env).is_err());
    let dest_dir = home.path().join("plugins");
    assert!(!dest_dir.join("git.hpi").exists());
    assert!(part_files(&dest_dir).is_empty());
}

#[test]
fn fetch_failure_leaves_destination_untouched() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let dest_dir = home.path().join("plugins");
    fs::create_dir_all(&dest_dir).unwrap();
    fs::write(dest_dir.join("missing.hpi"), b"prior").unwrap();

    let src = home.path().join("mirror/missing.hpi");
    let url = Url::from_file_path(&src).unwrap();
    let installer = Installer::new(Arc::new(CurlFetcher::default()));
    let spec = PluginSpec::new("missing", url.as_str(), sha256(b"whatever"));

    let err = installer.ensure_installed(&spec, &env).unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }), "got {err:?}");
    assert_eq!(fs::read(dest_dir.join("missing.hpi")).unwrap(), b"prior");
    assert!(part_files(&dest_dir).is_empty());
}

#[test]
fn installs_from_file_url_with_sha512() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let mirror = home.path().join("mirror");
    fs::create_dir_all(&mirror).unwrap();
    let body = b"docker plugin".to_vec();
    fs::write(mirror.join("docker-plugin.hpi"), &body).unwrap();

    let mut h = Hasher::new(Algorithm::Sha512);
    h.update(&body);
    let hash = ContentHash::new(Algorithm::Sha512, &h.finalize_hex()).unwrap();
    let url = Url::from_file_path(mirror.join("docker-plugin.hpi")).unwrap();
    let spec = PluginSpec::new("docker", url.as_str(), hash);

    let installer = Installer::new(Arc::new(CurlFetcher::default()));
    let out = installer.ensure_installed(&spec, &env).unwrap();
    assert_eq!(
        out.destination(),
        home.path().join("plugins/docker-plugin.hpi")
    );
    assert_eq!(fs::read(out.destination()).unwrap(), body);
}

#[test]
fn unknown_owner_fails_before_fetching() {
    let home = tempfile::tempdir().unwrap();
    let mut env = current_env(home.path());
    env.user = "no-such-user-pim-test".into();
    let fetcher = StaticFetcher::new(b"x");
    let installer = Installer::new(fetcher.clone());
    let spec = PluginSpec::new("git", "https://example/git.hpi", sha256(b"x"));

    let err = installer.ensure_installed(&spec, &env).unwrap_err();
    assert!(matches!(err, Error::Permission { .. }));
    assert_eq!(fetcher.calls(), 0);
    assert!(!home.path().join("plugins/git.hpi").exists());
}

#[test]
fn ownership_drift_is_repaired_without_fetch() {
    // SAFETY: getuid cannot fail.
    if unsafe { libc::getuid() } != 0 {
        // Changing a file to another owner needs root.
        return;
    }
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let body = b"git";
    let fetcher = StaticFetcher::new(body);
    let installer = Installer::new(fetcher.clone());
    let spec = PluginSpec::new("git", "https://example/git.hpi", sha256(body));
    let dest = installer.ensure_installed(&spec, &env).unwrap().destination().to_path_buf();

    Ownership { uid: 4242, gid: 4242 }.apply_to_path(&dest).unwrap();
    let planned = installer.plan(&spec, &env).unwrap();
    assert_eq!(planned, InstallOutcome::WouldUpdateOwnership { destination: dest.clone() });

    let out = installer.ensure_installed(&spec, &env).unwrap();
    assert_eq!(out, InstallOutcome::OwnershipUpdated { destination: dest.clone() });
    assert!(out.is_changed());
    assert!(!out.requires_restart());
    assert_eq!(fetcher.calls(), 1);
    let meta = fs::metadata(&dest).unwrap();
    assert_eq!(Ownership::of_metadata(&meta), Ownership { uid: 0, gid: 0 });
}

#[test]
fn plan_never_fetches_or_writes() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let body = b"git";
    let fetcher = StaticFetcher::new(body);
    let installer = Installer::new(fetcher.clone());
    let spec = PluginSpec::new("git", "https://example/git.hpi", sha256(body));
    let dest = home.path().join("plugins/git.hpi");

    assert_eq!(
        installer.plan(&spec, &env).unwrap(),
        InstallOutcome::WouldInstall {
            destination: dest.clone(),
            replaced: false
        }
    );
    assert!(!home.path().join("plugins").exists());

    fs::create_dir_all(home.path().join("plugins")).unwrap();
    fs::write(&dest, b"stale").unwrap();
    assert_eq!(
        installer.plan(&spec, &env).unwrap(),
        InstallOutcome::WouldInstall {
            destination: dest.clone(),
            replaced: true
        }
    );
    assert_eq!(fs::read(&dest).unwrap(), b"stale");
    assert_eq!(fetcher.calls(), 0);

    installer.ensure_installed(&spec, &env).unwrap();
    assert_eq!(
        installer.plan(&spec, &env).unwrap(),
        InstallOutcome::Unchanged { destination: dest }
    );
}

#[tokio::test]
async fn batch_reports_each_plugin_independently() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let body = b"shared body";
    let installer = Installer::new(StaticFetcher::new(body));
    let specs = vec![
        PluginSpec::new("git", "https://example/git.hpi", sha256(body)),
        PluginSpec::new("broken", "https://example/broken.hpi", sha256(b"other")),
        PluginSpec::new("docker", "https://example/docker.hpi", sha256(body)),
    ];

    let report = installer.install_all(&specs, &env, 2, false).await.unwrap();
    let names: Vec<_> = report.results.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["git", "broken", "docker"]);
    assert!(report.results[0].1.is_ok());
    assert!(matches!(report.results[1].1, Err(Error::HashMismatch { .. })));
    assert!(report.results[2].1.is_ok());
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.changed_count(), 2);
    assert!(report.restart_required());
    assert!(home.path().join("plugins/git.hpi").exists());
    assert!(home.path().join("plugins/docker.hpi").exists());
    assert!(!home.path().join("plugins/broken.hpi").exists());

    let again = installer.install_all(&specs, &env, 2, false).await.unwrap();
    assert!(!again.restart_required());
    assert_eq!(again.changed_count(), 0);
}

#[tokio::test]
async fn batch_dry_run_is_side_effect_free() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let fetcher = StaticFetcher::new(b"x");
    let installer = Installer::new(fetcher.clone());
    let specs = vec![PluginSpec::new("git", "https://example/git.hpi", sha256(b"x"))];

    let report = installer.install_all(&specs, &env, 4, true).await.unwrap();
    assert!(report.dry_run);
    assert!(!report.restart_required());
    assert_eq!(report.changed_count(), 1);
    assert_eq!(report.state_reports()[0].result, None);
    assert_eq!(fetcher.calls(), 0);
    assert!(!home.path().join("plugins").exists());
}

#[tokio::test]
async fn batch_rejects_duplicate_destinations() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let fetcher = StaticFetcher::new(b"x");
    let installer = Installer::new(fetcher.clone());
    let specs = vec![
        PluginSpec::new("git", "https://a.example/git.hpi", sha256(b"x")),
        PluginSpec::new("git-fork", "https://b.example/git.hpi", sha256(b"x")),
    ];

    let err = installer.install_all(&specs, &env, 2, false).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateDestination { .. }));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn batch_isolates_unresolvable_plugins() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let body = b"git body";
    let installer = Installer::new(StaticFetcher::new(body));
    let specs = vec![
        PluginSpec::new("git", "https://example/git.hpi", sha256(body)),
        PluginSpec::new("bad", "ftp://example/bad.hpi", sha256(body)),
    ];

    let report = installer.install_all(&specs, &env, 2, false).await.unwrap();
    assert!(matches!(report.results[0].1, Ok(InstallOutcome::Installed { .. })));
    assert!(matches!(report.results[1].1, Err(Error::InvalidSpec { .. })));
    assert_eq!(report.failure_count(), 1);
    assert!(home.path().join("plugins/git.hpi").exists());
}

#[tokio::test]
async fn part_named_plugin_cannot_clobber_sibling() {
    let home = tempfile::tempdir().unwrap();
    let env = current_env(home.path());
    let body = b"git body";
    let fetcher = StaticFetcher::new(body);
    let installer = Installer::new(fetcher.clone());
    let specs = vec![
        PluginSpec::new("shadow", "https://example/git.hpi.part", sha256(body)),
        PluginSpec::new("git", "https://example/git.hpi", sha256(body)),
    ];

    let report = installer.install_all(&specs, &env, 1, false).await.unwrap();
    assert!(matches!(report.results[0].1, Err(Error::InvalidSpec { .. })));
    assert!(matches!(report.results[1].1, Ok(InstallOutcome::Installed { .. })));
    assert_eq!(fetcher.calls(), 1);
    assert!(part_files(&home.path().join("plugins")).is_empty());

    let again = installer.install_all(&specs, &env, 1, false).await.unwrap();
    assert!(matches!(again.results[1].1, Ok(InstallOutcome::Unchanged { .. })));
    assert_eq!(fetcher.calls(), 1);
}
