//! `sonde-scan`: run the sensors of a scene and print their scans.
//!
//! Loads a JSON scene descriptor, builds its worlds, loads and initializes
//! every declared sensor, then steps the simulation clock and writes one JSON
//! line per refreshed ray sensor to stdout.
//!
//! ```text
//! sonde-scan <scene.json> [--steps N] [--dt SECONDS] [--skip-bad] [-v|-vv|-vvv]
//! ```
//!
//! Logging goes to stderr. `RUST_LOG` overrides the `-v` level.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use sonde_physics::{SceneDescriptor, WorldRegistry};
use sonde_sensors::{LoadPolicy, SensorManager, SensorRegistry};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: sonde-scan <scene.json> [--steps N] [--dt SECONDS] [--skip-bad] [-v|-vv|-vvv]";

/// Parsed command line.
#[derive(Debug, Clone, PartialEq)]
struct Options {
    scene: PathBuf,
    steps: u32,
    dt: f64,
    policy: LoadPolicy,
    verbosity: u8,
}

/// What the command line asks for.
#[derive(Debug, PartialEq)]
enum Command {
    Run(Options),
    Help,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut scene = None;
    let mut steps = 1;
    let mut dt = 0.1;
    let mut policy = LoadPolicy::Abort;
    let mut verbosity = 0;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--steps" => {
                let value = args.next().context("--steps needs a value")?;
                steps = value
                    .parse()
                    .with_context(|| format!("invalid --steps value '{value}'"))?;
            }
            "--dt" => {
                let value = args.next().context("--dt needs a value")?;
                dt = value
                    .parse()
                    .with_context(|| format!("invalid --dt value '{value}'"))?;
                if !(dt > 0.0 && f64::is_finite(dt)) {
                    bail!("--dt must be a positive number of seconds, got {value}");
                }
            }
            "--skip-bad" => policy = LoadPolicy::Skip,
            flag if flag.starts_with("-v") && flag[1..].chars().all(|c| c == 'v') => {
                verbosity = u8::try_from(flag.len() - 1).unwrap_or(u8::MAX);
            }
            flag if flag.starts_with('-') => bail!("unknown option '{flag}'\n{USAGE}"),
            path => {
                if scene.replace(PathBuf::from(path)).is_some() {
                    bail!("more than one scene file given\n{USAGE}");
                }
            }
        }
    }

    let scene = scene.with_context(|| format!("no scene file given\n{USAGE}"))?;
    Ok(Command::Run(Options {
        scene,
        steps,
        dt,
        policy,
        verbosity,
    }))
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .init();
}

/// Run the scene and write one JSON line per refreshed ray sensor to `out`.
fn run(options: &Options, out: &mut impl Write) -> Result<()> {
    let text = fs::read_to_string(&options.scene)
        .with_context(|| format!("cannot read scene file {}", options.scene.display()))?;
    let descriptor = SceneDescriptor::from_json_str(&text)
        .with_context(|| format!("cannot parse scene file {}", options.scene.display()))?;
    let worlds = WorldRegistry::load(&descriptor).context("cannot build worlds")?;
    if worlds.is_empty() {
        bail!("scene declares no <world>");
    }

    let mut manager = SensorManager::with_policy(options.policy);
    let loaded = manager
        .load_scene(&descriptor, &worlds, SensorRegistry::global())
        .context("cannot load sensors")?;
    let initialized = manager.init_all(&worlds).context("cannot initialize sensors")?;
    for (name, error) in loaded.skipped.iter().chain(&initialized.skipped) {
        warn!(sensor = %name, error = %error, "sensor skipped");
    }
    info!(
        worlds = worlds.len(),
        sensors = manager.len(),
        steps = options.steps,
        "scene ready"
    );

    for step in 0..options.steps {
        let sim_time = f64::from(step) * options.dt;
        let report = manager.step(&worlds, sim_time);
        for (name, error) in &report.failures {
            warn!(sensor = %name, error = %error, sim_time, "sensor update failed");
        }
        for name in &report.refreshed {
            let Some(sensor) = manager.ray_sensor(name) else {
                continue;
            };
            serde_json::to_writer(&mut *out, &sensor.scan()?)?;
            writeln!(out)?;
        }
    }
    out.flush()?;

    manager.fini_all();
    Ok(())
}

fn main() -> Result<()> {
    let options = match parse_args(std::env::args().skip(1))? {
        Command::Run(options) => options,
        Command::Help => {
            println!("{USAGE}");
            return Ok(());
        }
    };
    init_tracing(options.verbosity);
    let mut out = BufWriter::new(io::stdout().lock());
    run(&options, &mut out)
}

#[cfg(test)]
mod tests {
    use sonde_sensors::RayScan;

    use super::*;

    fn parse(args: &[&str]) -> Result<Command> {
        parse_args(args.iter().map(ToString::to_string))
    }

    #[test]
    fn test_defaults() {
        let Command::Run(options) = parse(&["scene.json"]).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(options.scene, PathBuf::from("scene.json"));
        assert_eq!(options.steps, 1);
        assert!((options.dt - 0.1).abs() < 1e-12);
        assert_eq!(options.policy, LoadPolicy::Abort);
        assert_eq!(options.verbosity, 0);
    }

    #[test]
    fn test_all_options() {
        let Command::Run(options) =
            parse(&["--steps", "20", "--dt", "0.05", "--skip-bad", "-vv", "s.json"]).unwrap()
        else {
            panic!("expected run");
        };
        assert_eq!(options.steps, 20);
        assert!((options.dt - 0.05).abs() < 1e-12);
        assert_eq!(options.policy, LoadPolicy::Skip);
        assert_eq!(options.verbosity, 2);
    }

    #[test]
    fn test_help() {
        assert_eq!(parse(&["--help"]).unwrap(), Command::Help);
    }

    #[test]
    fn test_rejections() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["a.json", "b.json"]).is_err());
        assert!(parse(&["a.json", "--steps"]).is_err());
        assert!(parse(&["a.json", "--steps", "many"]).is_err());
        assert!(parse(&["a.json", "--dt", "0"]).is_err());
        assert!(parse(&["a.json", "--frobnicate"]).is_err());
    }

    #[test]
    fn test_run_writes_scans() {
        let dir = std::env::temp_dir().join(format!("sonde-scan-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let scene = dir.join("scene.json");
        fs::write(
            &scene,
            r#"{
                "name": "world",
                "attributes": {"name": "default"},
                "children": [{
                    "name": "model",
                    "attributes": {"name": "robot"},
                    "children": [{
                        "name": "link",
                        "attributes": {"name": "base"},
                        "children": [{
                            "name": "sensor",
                            "attributes": {"name": "ray1", "type": "ray", "always_on": "true"},
                            "children": [{
                                "name": "ray",
                                "children": [{"name": "range", "attributes": {"min": "0.1", "max": "10"}}]
                            }]
                        }]
                    }]
                }]
            }"#,
        )
        .unwrap();

        let options = Options {
            scene,
            steps: 2,
            dt: 0.1,
            policy: LoadPolicy::Abort,
            verbosity: 0,
        };
        let mut out = Vec::new();
        run(&options, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let scans: Vec<RayScan> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(scans.len(), 2);
        for (scan, time) in scans.iter().zip([0.0, 0.1]) {
            assert_eq!(scan.sensor, "ray1");
            assert_eq!(scan.body, "root::robot::base");
            assert!((scan.time.unwrap() - time).abs() < 1e-12);
            assert_eq!(scan.readings.len(), 1);
            assert!((scan.readings[0].range - 10.0).abs() < 1e-12);
        }

        let missing = Options {
            scene: dir.join("absent.json"),
            ..options
        };
        let mut out = Vec::new();
        assert!(run(&missing, &mut out).is_err());
        assert!(out.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }
}
