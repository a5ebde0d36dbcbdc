//! Test-only helpers: an in-memory device and local save directories.
//!
//! [`FakeDevice`] implements [`RemoteShell`] and [`Transfer`] by interpreting
//! the command strings built by [`DeviceLayout`](crate::core::layout::DeviceLayout).
//! It enforces the sandbox: app data (`/data/data/<package>`) is only
//! reachable from commands run in that package's context, never by
//! push/pull. Every call is recorded in order.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::core::types::{SaveFile, SlotNumber};
use crate::io::adb::{RemoteShell, ShellOutput, Transfer};
use crate::install::PackageInstaller;

const APP_DATA_ROOT: &str = "/data/data";

/// A remote shell invocation as issued by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCall {
    pub command: String,
    pub app: Option<String>,
}

impl ShellCall {
    pub fn device(command: &str) -> Self {
        Self {
            command: command.to_string(),
            app: None,
        }
    }

    pub fn app(package: &str, command: &str) -> Self {
        Self {
            command: command.to_string(),
            app: Some(package.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Shell(ShellCall),
    Push { local: PathBuf, remote: String },
    Pull { remote: String, local: PathBuf },
}

/// Device filesystem contents (absolute paths).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
struct DeviceState {
    fs: DeviceSnapshot,
    calls: Vec<DeviceCall>,
    shell_failures: Vec<(String, i32)>,
    push_failure: Option<i32>,
    pull_failure: Option<i32>,
    force_stops: Vec<String>,
    output_limit: Option<usize>,
}

#[derive(Debug, Default)]
pub struct FakeDevice {
    state: RefCell<DeviceState>,
}

impl FakeDevice {
    pub fn new() -> Self {
        let device = Self::default();
        device.state.borrow_mut().fs.dirs.insert("/".to_string());
        device
    }

    /// Make every shell command containing `pattern` exit with `exit_code` without running.
    pub fn fail_shell(&self, pattern: &str, exit_code: i32) {
        self.state
            .borrow_mut()
            .shell_failures
            .push((pattern.to_string(), exit_code));
    }

    /// Cut shell stdout after `bytes`, flagging it as truncated like the adb adapter does.
    pub fn limit_output(&self, bytes: usize) {
        self.state.borrow_mut().output_limit = Some(bytes);
    }

    pub fn fail_push(&self, exit_code: i32) {
        self.state.borrow_mut().push_failure = Some(exit_code);
    }

    pub fn fail_pull(&self, exit_code: i32) {
        self.state.borrow_mut().pull_failure = Some(exit_code);
    }

    pub fn put_file(&self, path: &str, contents: &[u8]) {
        let path = normalize("/", path);
        let mut state = self.state.borrow_mut();
        make_parents(&mut state.fs, &path);
        state.fs.files.insert(path, contents.to_vec());
    }

    /// Write a file relative to the app's data directory.
    pub fn put_app_file(&self, package: &str, relative: &str, contents: &[u8]) {
        self.put_file(&format!("{APP_DATA_ROOT}/{package}/{relative}"), contents);
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .fs
            .files
            .get(&normalize("/", path))
            .cloned()
    }

    pub fn app_file(&self, package: &str, relative: &str) -> Option<Vec<u8>> {
        self.file(&format!("{APP_DATA_ROOT}/{package}/{relative}"))
    }

    pub fn exists(&self, path: &str) -> bool {
        let path = normalize("/", path);
        let state = self.state.borrow();
        state.fs.files.contains_key(&path) || state.fs.dirs.contains(&path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.state.borrow().fs.dirs.contains(&normalize("/", path))
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.state.borrow().fs.clone()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.borrow().calls.clone()
    }

    pub fn shell_calls(&self) -> Vec<ShellCall> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DeviceCall::Shell(shell) => Some(shell),
                _ => None,
            })
            .collect()
    }

    pub fn transfer_calls(&self) -> Vec<DeviceCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, DeviceCall::Shell(_)))
            .collect()
    }

    /// Packages stopped with `am force-stop`, in order.
    pub fn force_stops(&self) -> Vec<String> {
        self.state.borrow().force_stops.clone()
    }
}

impl RemoteShell for FakeDevice {
    fn run(&self, command: &str, app: Option<&str>) -> Result<ShellOutput> {
        let mut state = self.state.borrow_mut();
        state.calls.push(DeviceCall::Shell(ShellCall {
            command: command.to_string(),
            app: app.map(str::to_string),
        }));
        if let Some((_, code)) = state
            .shell_failures
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
        {
            return Ok(ShellOutput::new(*code, ""));
        }
        let mut output = execute(&mut state, command, app);
        if let Some(limit) = state.output_limit
            && output.stdout.len() > limit
        {
            output.stdout.truncate(limit);
            output.truncated = true;
        }
        Ok(output)
    }
}

impl Transfer for FakeDevice {
    fn push(&self, local: &Path, remote: &str) -> Result<i32> {
        let mut state = self.state.borrow_mut();
        state.calls.push(DeviceCall::Push {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        if let Some(code) = state.push_failure {
            return Ok(code);
        }
        let remote = normalize("/", remote);
        if is_app_private(&remote) || !local.is_dir() {
            return Ok(1);
        }
        for (relative, contents) in read_local_tree(local)? {
            let target = format!("{remote}/{relative}");
            make_parents(&mut state.fs, &target);
            state.fs.files.insert(target, contents);
        }
        make_dirs(&mut state.fs, &remote);
        Ok(0)
    }

    fn pull(&self, remote: &str, local: &Path) -> Result<i32> {
        let mut state = self.state.borrow_mut();
        state.calls.push(DeviceCall::Pull {
            remote: remote.to_string(),
            local: local.to_path_buf(),
        });
        if let Some(code) = state.pull_failure {
            return Ok(code);
        }
        let remote = normalize("/", remote);
        if is_app_private(&remote) || !state.fs.dirs.contains(&remote) {
            return Ok(1);
        }
        let prefix = format!("{remote}/");
        for (path, contents) in &state.fs.files {
            if let Some(relative) = path.strip_prefix(&prefix) {
                let target = local.join(relative);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("create {}", parent.display()))?;
                }
                fs::write(&target, contents)
                    .with_context(|| format!("write {}", target.display()))?;
            }
        }
        Ok(0)
    }
}

fn execute(state: &mut DeviceState, command: &str, app: Option<&str>) -> ShellOutput {
    let cwd = match app {
        Some(package) => format!("{APP_DATA_ROOT}/{package}"),
        None => "/".to_string(),
    };
    let resolve = |path: &str| normalize(&cwd, path);
    let allowed = |path: &str| match app {
        Some(package) => {
            !is_app_private(path) || within(path, &format!("{APP_DATA_ROOT}/{package}"))
        }
        None => !is_app_private(path),
    };

    let words: Vec<&str> = command.split_whitespace().collect();
    let code = match words.as_slice() {
        ["rm", "-r", path] => {
            let path = resolve(*path);
            if allowed(path.as_str()) && remove_tree(&mut state.fs, &path) {
                0
            } else {
                1
            }
        }
        ["rm", path] => {
            let path = resolve(*path);
            if allowed(path.as_str()) && state.fs.files.remove(&path).is_some() {
                0
            } else {
                1
            }
        }
        ["mkdir", "-p", path] => {
            let path = resolve(*path);
            if allowed(path.as_str()) {
                make_dirs(&mut state.fs, &path);
                0
            } else {
                1
            }
        }
        ["cp", "-r", src, dst] => {
            let (src, dst) = (resolve(*src), resolve(*dst));
            if allowed(src.as_str())
                && allowed(dst.as_str())
                && copy_tree(&mut state.fs, &src, &dst)
            {
                0
            } else {
                1
            }
        }
        ["cat", src, ">", dst] => {
            // The redirect belongs to the device shell, not the app.
            let (src, dst) = (resolve(*src), normalize("/", dst));
            if is_app_private(&dst) || !state.fs.dirs.contains(&parent_of(&dst)) {
                1
            } else {
                let contents = if allowed(src.as_str()) {
                    state.fs.files.get(&src).cloned()
                } else {
                    None
                };
                let code = if contents.is_some() { 0 } else { 1 };
                state.fs.files.insert(dst, contents.unwrap_or_default());
                code
            }
        }
        ["am", "force-stop", package] => {
            state.force_stops.push(package.to_string());
            0
        }
        ["xxd", "-c", "0", "-p", path] => {
            let path = resolve(*path);
            return match state.fs.files.get(&path).filter(|_| allowed(path.as_str())) {
                Some(contents) if contents.is_empty() => ShellOutput::new(0, ""),
                Some(contents) => ShellOutput::new(0, format!("{}\n", hex::encode(contents))),
                None => ShellOutput::new(2, ""),
            };
        }
        _ => 127,
    };
    ShellOutput::new(code, "")
}

fn is_app_private(path: &str) -> bool {
    within(path, APP_DATA_ROOT)
}

fn within(path: &str, root: &str) -> bool {
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Resolve `path` against `cwd`, dropping `.`, empty segments and trailing slashes.
fn normalize(cwd: &str, path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let base = if path.starts_with('/') { "" } else { cwd };
    for segment in base.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn make_dirs(fs: &mut DeviceSnapshot, path: &str) {
    let mut current = String::new();
    fs.dirs.insert("/".to_string());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        fs.dirs.insert(current.clone());
    }
}

fn make_parents(fs: &mut DeviceSnapshot, path: &str) {
    let parent = parent_of(path);
    make_dirs(fs, &parent);
}

fn remove_tree(fs: &mut DeviceSnapshot, path: &str) -> bool {
    if !fs.dirs.contains(path) {
        return false;
    }
    let prefix = format!("{path}/");
    fs.dirs.retain(|dir| dir != path && !dir.starts_with(&prefix));
    fs.files.retain(|file, _| !file.starts_with(&prefix));
    true
}

/// `cp -r <src dir> <dst dir>`: copies into `<dst>/<basename of src>`.
fn copy_tree(fs: &mut DeviceSnapshot, src: &str, dst: &str) -> bool {
    if !fs.dirs.contains(src) || !fs.dirs.contains(dst) {
        return false;
    }
    let name = src.rsplit('/').next().unwrap_or_default();
    let target_root = format!("{dst}/{name}");
    let prefix = format!("{src}/");
    let dirs: Vec<String> = fs
        .dirs
        .iter()
        .filter_map(|dir| dir.strip_prefix(&prefix))
        .map(|relative| format!("{target_root}/{relative}"))
        .collect();
    let files: Vec<(String, Vec<u8>)> = fs
        .files
        .iter()
        .filter_map(|(file, contents)| {
            file.strip_prefix(&prefix)
                .map(|relative| (format!("{target_root}/{relative}"), contents.clone()))
        })
        .collect();
    fs.dirs.insert(target_root);
    fs.dirs.extend(dirs);
    fs.files.extend(files);
    true
}

fn read_local_tree(root: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .context("strip local prefix")?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let contents = fs::read(entry.path())
            .with_context(|| format!("read {}", entry.path().display()))?;
        out.push((relative, contents));
    }
    Ok(out)
}

/// Local save root in a temp directory.
pub struct LocalSaves {
    dir: tempfile::TempDir,
}

impl LocalSaves {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create temp save root")?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn slot_dir(&self, slot: SlotNumber) -> PathBuf {
        self.root().join(slot.to_string())
    }

    pub fn write(&self, slot: SlotNumber, file: SaveFile, contents: &[u8]) -> Result<()> {
        let dir = self.slot_dir(slot);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(file.file_name());
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, slot: SlotNumber, file: SaveFile) -> Option<Vec<u8>> {
        fs::read(self.slot_dir(slot).join(file.file_name())).ok()
    }
}

/// Installer returning a fixed exit code and counting server shutdowns.
#[derive(Debug, Default)]
pub struct ScriptedInstaller {
    pub install_code: i32,
    installed: RefCell<Vec<PathBuf>>,
    kills: RefCell<u32>,
}

impl ScriptedInstaller {
    pub fn new(install_code: i32) -> Self {
        Self {
            install_code,
            ..Self::default()
        }
    }

    pub fn installed(&self) -> Vec<PathBuf> {
        self.installed.borrow().clone()
    }

    pub fn kills(&self) -> u32 {
        *self.kills.borrow()
    }
}

impl PackageInstaller for ScriptedInstaller {
    fn install(&self, apk: &Path) -> Result<i32> {
        self.installed.borrow_mut().push(apk.to_path_buf());
        Ok(self.install_code)
    }

    fn kill_server(&self) -> Result<i32> {
        *self.kills.borrow_mut() += 1;
        Ok(0)
    }
}
