use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use stratum_nav::common::config::{Config, config_file};
use stratum_nav::common::log;
use stratum_nav::compose::{
    ContentResolver, SlotContent, WrapperResolver, WrapperScope, compose,
};
use stratum_nav::flatten::{FlattenResult, Flattener, RenderableSurface, SurfaceId};
use stratum_nav::model::{Destination, NavNode, NavTree};
use stratum_nav::retention::RetentionCoordinator;
use stratum_nav::transition::{NavDirection, TransitionController, TransitionEvent};
use stratum_nav::window::{SizeClass, WindowContext};
use tracing::debug;

/// Prints the render plan of a navigation tree.
#[derive(Parser)]
struct Cli {
    /// Navigation tree to flatten, as RON (`.ron`) or JSON (`.json`).
    #[arg(value_name = "TREE", required_unless_present = "validate")]
    tree: Option<PathBuf>,

    /// Tree to animate towards. The plan is printed mid-transition.
    #[arg(long, value_name = "TREE")]
    to: Option<PathBuf>,

    /// Progress of the transition started with --to.
    #[arg(long, default_value_t = 0.5, requires = "to")]
    progress: f64,

    /// Animate --to as a pop instead of a push.
    #[arg(long, requires = "to")]
    back: bool,

    /// Window size class used when --size is not given.
    #[arg(long, default_value = "compact", conflicts_with = "size")]
    window: SizeClass,

    /// Exact window size as WIDTHxHEIGHT, classified with the configured
    /// breakpoints.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    size: Option<(f64, f64)>,

    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the plan as JSON.
    #[arg(long)]
    json: bool,

    /// Check whether the configuration file can be loaded and is valid.
    #[arg(long)]
    validate: bool,
}

fn main() {
    let opt = Cli::parse();
    log::init_logging();

    if let Err(e) = run(&opt) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(opt: &Cli) -> anyhow::Result<()> {
    let config_path = opt.config.clone().or_else(config_file);
    let config = match &config_path {
        Some(path) if path.exists() => Config::read(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        _ => Config::builtin()?,
    };

    if opt.validate {
        let issues = config.validate();
        if issues.is_empty() {
            println!("Config validation passed");
            return Ok(());
        }
        for issue in &issues {
            eprintln!("{issue}");
        }
        bail!("{} configuration issue(s)", issues.len());
    }
    let issues = config.validate();
    if !issues.is_empty() {
        bail!("invalid configuration: {}", issues.join("; "));
    }

    let Some(tree_path) = &opt.tree else {
        bail!("no tree given");
    };
    let tree = Arc::new(load_tree(tree_path)?);

    let window = match opt.size {
        Some((width, height)) => WindowContext::new(width, height, &config.window.breakpoints()),
        None => match opt.window {
            SizeClass::Compact => WindowContext::compact(),
            SizeClass::Medium => WindowContext::medium(),
            SizeClass::Expanded => WindowContext::expanded(),
        },
    };
    debug!(?window, "window");

    let mut controller = TransitionController::new(tree.clone());
    if let Some(to) = &opt.to {
        let target = Arc::new(load_tree(to)?);
        let direction = if opt.back { NavDirection::Backward } else { NavDirection::Forward };
        for event in [
            TransitionEvent::StartAnimation { target, direction },
            TransitionEvent::UpdateProgress(opt.progress),
        ] {
            let response = controller.handle_event(event)?;
            debug!(lock = ?response.lock, unlock = ?response.unlock, "transition event");
        }
    }

    let mut flattener = Flattener::new(config.flatten);
    let result = flattener.flatten_state(controller.state(), &window)?;
    let mut retention = RetentionCoordinator::new(&config.retention);
    let report = retention.apply(&result, controller.state().target());

    if opt.json {
        println!("{}", serde_json::to_string_pretty(&*result)?);
        return Ok(());
    }

    print!("{}", controller.state().target().draw());
    println!();
    print_plan(&result);

    let composed = compose(&result, &mut Routes, &mut Chrome)?;
    println!("\ncomposition:");
    for surface in composed {
        println!("  {:>5}  {}", surface.z_order, surface.output);
    }

    let store = retention.store();
    println!("\nretention ({}/{}):", store.len(), store.capacity());
    for key in store.lru_order() {
        let protection = store
            .get(key.as_str())
            .and_then(|e| e.protection())
            .map(|p| format!(" [{p}]"))
            .unwrap_or_default();
        println!("  {key}{protection}");
    }
    if report.overrun > 0 {
        println!("  over capacity by {}", report.overrun);
    }
    Ok(())
}

fn load_tree(path: &Path) -> anyhow::Result<NavTree> {
    let buf =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let node: NavNode = match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => ron::from_str(&buf).with_context(|| format!("parsing {}", path.display()))?,
        Some("json") => {
            serde_json::from_str(&buf).with_context(|| format!("parsing {}", path.display()))?
        }
        _ => bail!("{}: expected a .ron or .json tree", path.display()),
    };
    Ok(NavTree::new(node)?)
}

fn parse_size(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("`{s}` is not of the form WIDTHxHEIGHT"))?;
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("`{v}`: {e}"));
    Ok((parse(w)?, parse(h)?))
}

fn print_plan(result: &FlattenResult) {
    println!("surfaces:");
    for s in &result.surfaces {
        let parent = s.parent_wrapper_id.as_ref().map(|p| format!(" in {p}")).unwrap_or_default();
        println!(
            "  {:>5}  {:<24} {:<15} {:<14} {}{parent}",
            s.z_order,
            s.id.as_str(),
            s.kind,
            s.phase.to_string(),
            result.hints.scope(s.id.as_str()),
        );
    }
    if !result.pairs.is_empty() {
        println!("pairs:");
        for pair in &result.pairs {
            println!(
                "  {} {} -> {}",
                pair.kind,
                or_dash(&pair.exiting_id),
                or_dash(&pair.entering_id)
            );
        }
    }
    if !result.hints.retained.is_empty() {
        let retained: Vec<&str> = result.hints.retained.iter().map(|k| k.as_str()).collect();
        println!("retained: {}", retained.join(", "));
    }
}

fn or_dash(id: &Option<SurfaceId>) -> String {
    id.as_ref().map_or_else(|| "-".to_owned(), ToString::to_string)
}

struct Routes;

impl ContentResolver for Routes {
    type Output = String;

    fn resolve(&mut self, destination: &Destination, _: &RenderableSurface) -> String {
        destination.route.clone()
    }
}

struct Chrome;

impl WrapperResolver<String> for Chrome {
    fn wrap(&mut self, scope: &WrapperScope<'_>, slots: &mut SlotContent<'_, String>) -> String {
        let rendered: Vec<String> = (0..slots.len())
            .map(|i| {
                let content: Vec<String> =
                    slots.render(i).into_iter().map(|c| c.output).collect();
                match scope.roles.get(i).copied().flatten() {
                    Some(role) => format!("{role}: {}", content.join(" / ")),
                    None => content.join(" / "),
                }
            })
            .collect();
        format!("{} {{ {} }}", scope.kind(), rendered.join(", "))
    }
}
