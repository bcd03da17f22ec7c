//! renode-run: fetch a prebuilt Renode and run it
//! ==============================================
//!
//! ## Quick start
//! ```bash
//! renode-run                                  # newest cached Renode, downloading the nightly if needed
//! renode-run -- --console -e "mach create"    # same, with arguments for Renode
//! ```
//!
//! ## Subcommands
//! | Command        | What it does                                                              |
//! |----------------|---------------------------------------------------------------------------|
//! | **download**   | Fetch a pinned version or the nightly into the cache.                     |
//! | **exec**       | Run `renode` from the cache, forwarding everything after `--`.            |
//! | **test**       | Run `renode-test` inside a Python environment created on first use.       |
//! | **demo**       | Run a Zephyr sample (or your own `.elf`) on a board from the dashboard.   |
//!
//! ## Global flags
//! | Flag                        | Default                | Purpose                                    |
//! |-----------------------------|------------------------|--------------------------------------------|
//! | `-a, --artifacts-path PATH` | `~/.config/renode`     | Root for downloads and the test venv.      |
//! | `--renode-variant V`        | `mono-portable`        | `mono-portable` or `dotnet-portable`.      |
//! | `-v` *(repeatable)*         | info                   | Raise log verbosity.                       |
//!
//! ## Examples
//! ```bash
//! renode-run download 1.15.3+20240924gitc7bc336bb
//! renode-run download --no-version-dirs --path ./renode
//! renode-run test -- tests/platforms/hifive1.robot
//! renode-run demo --board hifive1 -g shell_module
//! ```
//!
//! ## Exit codes
//! * the child's exit code once Renode has been started
//! * `1` for any failure before that
//! * `2` for argument errors (from **clap**)

use renode_run::*;

#[derive(Debug, clap::Parser)]
#[command(name = "renode-run", version, about = "Download and run prebuilt Renode")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    cmd: Option<Cmd>,

    /// Arguments for Renode when no subcommand is given.
    #[command(flatten)]
    forwarded: ForwardedArgs,
}

#[derive(Debug, clap::Subcommand)]
enum Cmd {
    /// Download Renode into the cache.
    Download {
        #[command(flatten)]
        args: DownloadArgs,
    },

    /// Run Renode, downloading it first if nothing is cached.
    Exec {
        #[command(flatten)]
        forwarded: ForwardedArgs,
    },

    /// Run renode-test in its Python environment.
    Test {
        /// Python environment to create or reuse [default: <artifacts-path>/renode-run.venv]
        #[arg(long, value_name = "PATH")]
        venv: Option<std::path::PathBuf>,

        #[command(flatten)]
        forwarded: ForwardedArgs,
    },

    /// Run a Zephyr demo on an emulated board.
    Demo {
        #[command(flatten)]
        demo: DemoArgs,

        #[command(flatten)]
        forwarded: ForwardedArgs,
    },
}

fn main() {
    let cli = <Cli as clap::Parser>::parse();

    if let Err(e) = init_logging(cli.global.verbose) {
        eprintln!("warning: {e}");
    }

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> RenodeRunResult<i32> {
    let config = cli.global.config()?;
    let variant = cli.global.renode_variant;

    match cli.cmd {
        // ───────────────────────────── Download ─────────────────────────────
        Some(Cmd::Download { args }) => {
            let store = match &args.path {
                Some(path) => {
                    ArtifactStore::with_download_dir(path, config.builds_url.clone(), args.layout())
                }
                None => ArtifactStore::new(&config, args.layout()),
            };
            let outcome = store.download(variant, args.version.as_deref(), args.force)?;
            println!("{outcome}");
            Ok(0)
        }

        // ─────────────────────────── Exec / bare ────────────────────────────
        None => exec(&config, variant, &cli.forwarded.args),
        Some(Cmd::Exec { forwarded }) => exec(&config, variant, &forwarded.args),

        // ─────────────────────────────── Test ───────────────────────────────
        Some(Cmd::Test { venv, forwarded }) => {
            let entry = ArtifactStore::new(&config, CacheLayout::Versioned).locate_or_download(variant)?;
            let mut launcher = Launcher::new(&config);
            if let Some(venv) = venv {
                launcher = launcher.with_venv_dir(venv);
            }
            launcher.run(&entry, &forwarded.args, EntryPoint::Test)
        }

        // ─────────────────────────────── Demo ───────────────────────────────
        Some(Cmd::Demo { demo, forwarded }) => {
            let target = DemoTarget::parse(&demo.target)?;
            let work_dir = std::env::current_dir()
                .map_err(|e| RenodeRunError::file_system("read current dir", ".", e))?;
            let resolver = DemoResolver::new(
                DashboardCatalog::new(config.dashboard_url.clone()),
                Dts2Repl::new(&config.dts2repl),
                work_dir,
            )?;
            let spec = resolver.resolve_demo(&demo.board, &target, demo.generate_repl)?;
            let script = resolver.write_script(&spec)?;
            let entry = ArtifactStore::new(&config, CacheLayout::Versioned).locate_or_download(variant)?;

            Launcher::new(&config).run_with(
                &entry,
                EntryPoint::Main,
                vec![script.to_string_lossy().into_owned()],
                &forwarded.args,
            )
        }
    }
}

fn exec(config: &RenodeRunConfig, variant: RenodeVariant, args: &[String]) -> RenodeRunResult<i32> {
    let entry = ArtifactStore::new(config, CacheLayout::Versioned).locate_or_download(variant)?;
    Launcher::new(config).run(&entry, args, EntryPoint::Main)
}

fn report(e: &RenodeRunError) {
    eprintln!("error: {e}");
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}
