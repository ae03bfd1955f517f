//! Git hook command implementations.
//!
//! These commands are called by the hook scripts `devback setup` installs.
//! They can also be run manually for testing. Two rules govern everything
//! here:
//!
//! 1. Hooks always exit 0. A failed backup must never block a commit, a
//!    merge, or a rebase; problems surface through logs and desktop
//!    notifications instead.
//! 2. Hooks are quiet about *why* they skipped, but not silent: every skip
//!    path logs a stable reason tag so `--verbose` makes the decision
//!    traceable.

use anyhow::Result;
use clap::{Args, Subcommand};
use log::{debug, info};

use devback::backup::{self, BackupResult};
use devback::cancel::CancelToken;
use devback::config::{Config, ConfigFile};
use devback::debounce;
use devback::error::Error;
use devback::git::{CommandGit, GitPort};
use devback::notify::{DesktopNotifier, Notifier};
use devback::repository::{self, GitDirs};
use devback::status::read_enabled;

/// Arguments for the hook command group
#[derive(Args, Debug)]
pub struct HookArgs {
    #[command(subcommand)]
    pub command: HookCommand,

    /// Plan without running a backup
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Disable desktop notifications
    #[arg(long, global = true)]
    pub no_notify: bool,
}

#[derive(Subcommand, Debug)]
pub enum HookCommand {
    /// Backup after a commit
    PostCommit,

    /// Backup after a merge
    PostMerge,

    /// Backup after a rewrite; takes the rewrite kind (rebase or amend)
    PostRewrite {
        /// Rewrite kind reported by git (rebase or amend)
        command: String,
    },
}

struct HookContext {
    git: CommandGit,
    repo_root: std::path::PathBuf,
    dirs: GitDirs,
    config_file: ConfigFile,
    cfg: Config,
}

/// Execute a hook command. Infallible by design: every internal failure is
/// logged and swallowed.
pub fn execute(args: HookArgs) -> Result<()> {
    let Some(ctx) = preflight() else {
        return Ok(());
    };

    match &args.command {
        HookCommand::PostCommit => post_commit(&args, &ctx),
        HookCommand::PostMerge => {
            run_backup_and_notify(&args, &ctx);
        }
        HookCommand::PostRewrite { command } => post_rewrite(&args, &ctx, command),
    }
    Ok(())
}

/// Common gate for every hook: a repository, backups enabled, and a usable
/// configuration. Any missing piece is a silent (logged) skip.
fn preflight() -> Option<HookContext> {
    let git = CommandGit::new();

    let Ok(repo_root) = git.repo_root() else {
        skip("SKIP_NOT_GIT_REPO");
        return None;
    };

    if !read_enabled(&git, &repo_root) {
        skip("SKIP_DISABLED");
        return None;
    }

    let Ok(runtime) = super::load_runtime() else {
        skip("SKIP_NO_CONFIG");
        return None;
    };
    if !runtime.config_exists {
        skip("SKIP_NO_CONFIG");
        return None;
    }
    if runtime.config.backup_dir.as_os_str().is_empty() {
        skip("SKIP_NO_BASEDIR");
        return None;
    }

    let Ok(dirs) = repository::resolve_git_dirs(&git, &repo_root) else {
        skip("SKIP_NOT_GIT_REPO");
        return None;
    };

    Some(HookContext {
        git,
        repo_root,
        dirs,
        config_file: runtime.config_file,
        cfg: runtime.config,
    })
}

fn skip(reason: &str) {
    debug!("skip hook: {}", reason);
}

fn post_commit(args: &HookArgs, ctx: &HookContext) {
    if debounce::is_rebase_reflog_action() {
        skip("SKIP_REBASE_REFLOG");
        return;
    }
    if debounce::is_rebase_in_progress(&ctx.dirs.git_dir) {
        skip("SKIP_REBASE_IN_PROGRESS");
        return;
    }
    run_backup_and_notify(args, ctx);
}

fn post_rewrite(args: &HookArgs, ctx: &HookContext, command: &str) {
    let is_rebase = command.trim().eq_ignore_ascii_case("rebase");
    let stamp = debounce::stamp_path(&ctx.dirs.common_dir);

    if is_rebase {
        if debounce::is_rebase_in_progress(&ctx.dirs.git_dir) {
            skip("SKIP_REBASE_IN_PROGRESS");
            return;
        }
        if debounce::is_debounce_active(&stamp, chrono::Utc::now()) {
            skip("SKIP_DEBOUNCE");
            return;
        }
    }

    let outcome = run_backup_and_notify(args, ctx);

    // Stamp on success and failure alike: a failing rebase sequence must not
    // retry on every rewritten commit.
    if outcome.ran {
        if let Err(err) = debounce::update_stamp(&stamp, chrono::Utc::now()) {
            debug!("failed to update debounce stamp: {}", err);
        }
    }
}

struct HookOutcome {
    /// True when a backup was actually attempted (not skipped, not dry-run).
    ran: bool,
}

fn run_backup_and_notify(args: &HookArgs, ctx: &HookContext) -> HookOutcome {
    if args.dry_run {
        info!("dry-run: would run backup");
        return HookOutcome { ran: false };
    }

    let token = CancelToken::new();
    match backup::backup(&ctx.cfg, &ctx.git, &token) {
        Ok(result) => {
            notify(args, ctx, true, Some(&result));
            HookOutcome { ran: true }
        }
        Err(Error::LockBusy) => {
            skip("SKIP_LOCK_BUSY");
            HookOutcome { ran: false }
        }
        Err(Error::Interrupted) => HookOutcome { ran: false },
        Err(err) => {
            debug!("hook backup failed: {}", err);
            notify(args, ctx, false, None);
            HookOutcome { ran: true }
        }
    }
}

fn notify(args: &HookArgs, ctx: &HookContext, success: bool, result: Option<&BackupResult>) {
    if args.no_notify || !ctx.config_file.notifications.enabled {
        return;
    }

    let repo = shorten_home(&ctx.repo_root.to_string_lossy());
    let (message, sound) = match (success, result) {
        (false, _) => (format!("{}: Backup failed", repo), "Basso".to_string()),
        (true, Some(result)) if result.partial_success => (
            format!(
                "{}: {} files copied, {} errors",
                repo, result.copied_files, result.skipped_files
            ),
            configured_sound(ctx),
        ),
        (true, Some(result)) => (
            format!("{}: {} files copied", repo, result.copied_files),
            configured_sound(ctx),
        ),
        (true, None) => (format!("{}: Backup completed", repo), configured_sound(ctx)),
    };

    let _ = DesktopNotifier.send("DevBack", &message, &sound);
}

fn configured_sound(ctx: &HookContext) -> String {
    let sound = ctx.config_file.notifications.sound.trim();
    if sound.is_empty() {
        "default".to_string()
    } else {
        sound.to_string()
    }
}

fn shorten_home(path: &str) -> String {
    let home = devback::defaults::home_dir();
    let home = home.to_string_lossy();
    if home.is_empty() || home == "." {
        return path.to_string();
    }
    if path == home {
        return "~".to_string();
    }
    if let Some(rest) = path.strip_prefix(&format!("{}/", home)) {
        return format!("~/{}", rest);
    }
    path.to_string()
}
