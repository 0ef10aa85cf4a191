//! One benchmark process per CPU core, each pinned to its core.
//!
//! Every launch spawns `<executable> <output> <calls> <size> <core>` once per
//! configured core. Each child writes its rows to its own file in a fresh
//! scratch directory; after every child has been reaped the rows are
//! appended, core by core, to the aggregated result file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use super::{CapturedChild, Liveness, ProcessOutput, Workload, thread_env};
use crate::error::{Error, Result};
use crate::merge::{RESULT_SCHEMA, merge_into};
use crate::sink::{Sink, open_append};

/// How each child is bound to its core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pinning {
    /// `numactl --physcpubind=<core> --localalloc`: core plus local memory.
    #[default]
    Numactl,
    /// `sched_setaffinity` in the child before exec (CPU only).
    Affinity,
    /// No binding.
    None,
}

impl std::fmt::Display for Pinning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numactl => write!(f, "numactl"),
            Self::Affinity => write!(f, "affinity"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Which children decide that a launch is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LivenessPolicy {
    /// Only the first spawned child is watched; the others are assumed to
    /// finish at about the same time. Draining still waits for all of them.
    #[default]
    Leader,
    /// Running until every child has exited.
    All,
}

impl std::fmt::Display for LivenessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leader => write!(f, "leader"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Configuration of a pinned multi-core workload.
#[derive(Debug, Clone)]
pub struct PinnedConfig {
    /// Benchmark executable honouring `<output> <calls> <size> <core>`.
    pub executable: PathBuf,
    /// Aggregated result file, created (truncated unless `append`) when the
    /// set is built.
    pub output: PathBuf,
    pub cores: Vec<u32>,
    pub calls: u64,
    pub size: u64,
    /// Math-library thread count exported to each child.
    pub threads: Option<usize>,
    pub pinning: Pinning,
    pub liveness: LivenessPolicy,
    /// Keep the rows already in `output` instead of truncating it.
    pub append: bool,
}

impl Default for PinnedConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("thermobench-kernel"),
            output: PathBuf::from("/tmp/stress_results.csv"),
            cores: vec![1],
            calls: 100,
            size: 512,
            threads: Some(1),
            pinning: Pinning::default(),
            liveness: LivenessPolicy::default(),
            append: false,
        }
    }
}

impl PinnedConfig {
    /// Reject duplicate cores and executables that cannot be found.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for &core in &self.cores {
            if !seen.insert(core) {
                return Err(Error::DuplicateAssignment { core });
            }
        }
        if resolve_executable(&self.executable).is_none() {
            return Err(Error::unavailable(&self.executable));
        }
        Ok(())
    }
}

/// Locate `program` the way `execvp` would: paths with a separator are taken
/// as-is, bare names are looked up in `PATH`.
fn resolve_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.exists().then(|| program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

struct Member {
    core: u32,
    output: PathBuf,
    child: CapturedChild,
}

/// Live processes of one launch and their scratch directory.
pub struct PinnedHandle {
    scratch: TempDir,
    members: Vec<Member>,
}

impl PinnedHandle {
    /// Cores in spawn order.
    pub fn cores(&self) -> Vec<u32> {
        self.members.iter().map(|m| m.core).collect()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

struct PendingMerge {
    _scratch: TempDir,
    files: Vec<PathBuf>,
}

/// The pinned multi-core workload.
pub struct PinnedSet {
    config: PinnedConfig,
    results: Sink,
    pending: Option<PendingMerge>,
}

impl PinnedSet {
    /// Validate `config` and create the aggregated result file.
    ///
    /// Fails with [`Error::DuplicateAssignment`] before anything is spawned
    /// or written.
    pub fn new(config: PinnedConfig) -> Result<Self> {
        config.validate()?;
        let results = if config.append {
            open_append(&config.output, RESULT_SCHEMA)?
        } else {
            Sink::create(&config.output, RESULT_SCHEMA)?
        };
        Ok(Self {
            config,
            results,
            pending: None,
        })
    }

    pub fn config(&self) -> &PinnedConfig {
        &self.config
    }

    /// Data rows merged into the result file so far.
    pub fn merged_rows(&self) -> u64 {
        self.results.rows()
    }

    fn command_for(&self, core: u32, output: &Path) -> Command {
        let exe = &self.config.executable;
        let mut cmd = match self.config.pinning {
            Pinning::Numactl => {
                let mut cmd = Command::new("numactl");
                cmd.arg(format!("--physcpubind={core}"))
                    .arg("--localalloc")
                    .arg(exe);
                cmd
            }
            Pinning::Affinity => {
                let mut cmd = Command::new(exe);
                bind_to_core(&mut cmd, core);
                cmd
            }
            Pinning::None => Command::new(exe),
        };
        cmd.arg(output)
            .arg(self.config.calls.to_string())
            .arg(self.config.size.to_string())
            .arg(core.to_string());
        if let Some(threads) = self.config.threads {
            cmd.envs(thread_env(threads));
        }
        cmd
    }
}

#[cfg(target_os = "linux")]
fn bind_to_core(cmd: &mut Command, core: u32) {
    use std::os::unix::process::CommandExt;

    let core = core as usize;
    // SAFETY: the hook runs in the forked child before exec and only touches
    // a stack-local cpu_set_t and the sched_setaffinity syscall, both of
    // which are async-signal-safe.
    unsafe {
        cmd.pre_exec(move || {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_SET(core, &mut set);
            if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
fn bind_to_core(_cmd: &mut Command, core: u32) {
    log::warn!("affinity pinning is only supported on Linux; core {core} left unbound");
}

impl Workload for PinnedSet {
    type Handle = PinnedHandle;

    fn describe(&self) -> String {
        format!(
            "{} on cores {:?} ({})",
            self.config.executable.display(),
            self.config.cores,
            self.config.pinning
        )
    }

    fn start(&mut self) -> Result<PinnedHandle> {
        self.pending = None;
        let scratch = tempfile::Builder::new()
            .prefix("thermobench-")
            .tempdir()?;

        let mut members: Vec<Member> = Vec::with_capacity(self.config.cores.len());
        for &core in &self.config.cores {
            let output = scratch.path().join(format!("core_{core}.csv"));
            let label = format!("core {core}: {}", self.config.executable.display());
            match CapturedChild::spawn(self.command_for(core, &output), label) {
                Ok(child) => members.push(Member {
                    core,
                    output,
                    child,
                }),
                Err(e) => {
                    for member in members {
                        if let Err(kill_err) = member.child.kill() {
                            log::warn!(
                                "failed to stop core {} after spawn error: {kill_err}",
                                member.core
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }
        log::info!("started {} pinned processes", members.len());
        Ok(PinnedHandle { scratch, members })
    }

    fn poll(&mut self, handle: &mut PinnedHandle) -> Result<Liveness> {
        match self.config.liveness {
            LivenessPolicy::Leader => match handle.members.first_mut() {
                Some(leader) => Ok(match leader.child.try_exit()? {
                    Some(code) => Liveness::Exited(code),
                    None => Liveness::Running,
                }),
                None => Ok(Liveness::Exited(0)),
            },
            LivenessPolicy::All => {
                let mut first_failure = None;
                for member in &mut handle.members {
                    match member.child.try_exit()? {
                        None => return Ok(Liveness::Running),
                        Some(code) if code != 0 => {
                            first_failure.get_or_insert(code);
                        }
                        Some(_) => {}
                    }
                }
                Ok(Liveness::Exited(first_failure.unwrap_or(0)))
            }
        }
    }

    fn drain(&mut self, handle: PinnedHandle) -> Result<Vec<ProcessOutput>> {
        let mut outputs = Vec::with_capacity(handle.members.len());
        let mut files = Vec::with_capacity(handle.members.len());
        for member in handle.members {
            log::debug!("waiting for {}", member.child.label());
            outputs.push(member.child.wait_output()?);
            files.push(member.output);
        }
        self.pending = Some(PendingMerge {
            _scratch: handle.scratch,
            files,
        });
        Ok(outputs)
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(pending) = self.pending.take() {
            let summary = merge_into(&mut self.results, &pending.files)?;
            log::info!(
                "merged {} rows from {} cores into {}",
                summary.rows,
                summary.files,
                self.results.path().display()
            );
        }
        Ok(())
    }

    fn abort(&mut self, handle: PinnedHandle) -> Result<()> {
        let mut first_err = None;
        for member in handle.members {
            if let Err(e) = member.child.kill() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
