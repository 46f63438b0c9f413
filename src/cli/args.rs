//! CLI argument parsing

use crate::config::SettingsOverrides;
use crate::taxonomy::Category;
use crate::taxonomy::mapping::RIPROCESS_TO_GEOBC;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    Gather(GatherArgs),
    Resolve(ResolveArgs),
    Copy(CopyArgs),
    Resubmit(ResubmitArgs),
    Delivery(DeliveryArgs),
}

/// Options shared by every command that loads settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsArgs {
    pub config: Option<String>,
    pub overrides: SettingsOverrides,
}

#[derive(Debug, Clone)]
pub struct GatherArgs {
    pub source: String,
    pub mapping: String,
    /// Only list these categories; empty means all.
    pub categories: Vec<Category>,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct ResolveArgs {
    pub destination: String,
    pub probe: bool,
    pub json: bool,
    pub settings: SettingsArgs,
}

#[derive(Debug, Clone)]
pub struct CopyArgs {
    pub source: String,
    pub destination: String,
    pub nas_id: i64,
    pub delivery_id: i64,
    pub mapping: String,
    pub manifest: Option<String>,
    pub dry_run: bool,
    pub json: bool,
    pub settings: SettingsArgs,
}

#[derive(Debug, Clone)]
pub struct ResubmitArgs {
    pub manifest: String,
    pub dry_run: bool,
    pub settings: SettingsArgs,
}

#[derive(Debug, Clone)]
pub struct DeliveryArgs {
    pub receiver: String,
    pub date: String,
    pub comments: String,
    pub json: bool,
    pub settings: SettingsArgs,
}

/// Parse command line arguments
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    if args.len() < 2 {
        return Err("No command specified".to_string());
    }

    let rest = &args[2..];
    let command = match args[1].as_str() {
        "gather" => Command::Gather(parse_gather_args(rest)?),
        "resolve" => Command::Resolve(parse_resolve_args(rest)?),
        "copy" => Command::Copy(parse_copy_args(rest)?),
        "resubmit" => Command::Resubmit(parse_resubmit_args(rest)?),
        "delivery" => Command::Delivery(parse_delivery_args(rest)?),
        _ => return Err(format!("Unknown command: {}", args[1])),
    };

    Ok(CliArgs { command })
}

/// Value following the flag at `args[*i]`; advances `i` past it.
fn flag_value(args: &[String], i: &mut usize, what: &str) -> Result<String, String> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{flag} requires {what}"))
}

/// Consume a settings flag at `args[*i]`. Returns false for other flags.
fn parse_settings_flag(
    args: &[String],
    i: &mut usize,
    settings: &mut SettingsArgs,
) -> Result<bool, String> {
    match args[*i].as_str() {
        "--config" => settings.config = Some(flag_value(args, i, "a file path")?),
        "--api-url" => settings.overrides.api_url = Some(flag_value(args, i, "a URL")?),
        "--port" => settings.overrides.port = Some(flag_value(args, i, "a value")?),
        "--layout" => settings.overrides.layout = Some(flag_value(args, i, "a value")?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_id(flag: &str, text: &str) -> Result<i64, String> {
    text.parse()
        .map_err(|_| format!("{flag} must be an integer"))
}

fn parse_gather_args(args: &[String]) -> Result<GatherArgs, String> {
    let mut source = String::new();
    let mut mapping = RIPROCESS_TO_GEOBC.to_string();
    let mut categories = Vec::new();
    let mut json = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--mapping" => mapping = flag_value(args, &mut i, "a value")?,
            "--category" => {
                let label = flag_value(args, &mut i, "a value")?;
                let category = Category::from_label(&label)
                    .ok_or_else(|| format!("Unknown category: {label}"))?;
                if !categories.contains(&category) {
                    categories.push(category);
                }
            }
            "--json" => json = true,
            arg if !arg.starts_with("--") => {
                if source.is_empty() {
                    source = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    if source.is_empty() {
        return Err("Missing required argument: SOURCE".to_string());
    }

    Ok(GatherArgs {
        source,
        mapping,
        categories,
        json,
    })
}

fn parse_resolve_args(args: &[String]) -> Result<ResolveArgs, String> {
    let mut destination = String::new();
    let mut probe = false;
    let mut json = false;
    let mut settings = SettingsArgs::default();
    let mut i = 0;

    while i < args.len() {
        if parse_settings_flag(args, &mut i, &mut settings)? {
            i += 1;
            continue;
        }
        match args[i].as_str() {
            "--probe" => probe = true,
            "--json" => json = true,
            arg if !arg.starts_with("--") => {
                if destination.is_empty() {
                    destination = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    if destination.is_empty() {
        return Err("Missing required argument: DESTINATION".to_string());
    }

    Ok(ResolveArgs {
        destination,
        probe,
        json,
        settings,
    })
}

fn parse_copy_args(args: &[String]) -> Result<CopyArgs, String> {
    let mut positional: Vec<String> = Vec::new();
    let mut nas_id = None;
    let mut delivery_id = None;
    let mut mapping = RIPROCESS_TO_GEOBC.to_string();
    let mut manifest = None;
    let mut dry_run = false;
    let mut json = false;
    let mut settings = SettingsArgs::default();
    let mut i = 0;

    while i < args.len() {
        if parse_settings_flag(args, &mut i, &mut settings)? {
            i += 1;
            continue;
        }
        match args[i].as_str() {
            "--nas-id" => {
                let value = flag_value(args, &mut i, "a value")?;
                nas_id = Some(parse_id("--nas-id", &value)?);
            }
            "--delivery-id" => {
                let value = flag_value(args, &mut i, "a value")?;
                delivery_id = Some(parse_id("--delivery-id", &value)?);
            }
            "--mapping" => mapping = flag_value(args, &mut i, "a value")?,
            "--manifest" => manifest = Some(flag_value(args, &mut i, "a file path")?),
            "--dry-run" => dry_run = true,
            "--json" => json = true,
            arg if !arg.starts_with("--") => {
                if positional.len() == 2 {
                    return Err(format!("Unexpected argument: {arg}"));
                }
                positional.push(arg.to_string());
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let source = positional
        .next()
        .ok_or_else(|| "Missing required argument: SOURCE".to_string())?;
    let destination = positional
        .next()
        .ok_or_else(|| "Missing required argument: DESTINATION".to_string())?;

    Ok(CopyArgs {
        source,
        destination,
        nas_id: nas_id.ok_or_else(|| "--nas-id is required for copy".to_string())?,
        delivery_id: delivery_id
            .ok_or_else(|| "--delivery-id is required for copy".to_string())?,
        mapping,
        manifest,
        dry_run,
        json,
        settings,
    })
}

fn parse_resubmit_args(args: &[String]) -> Result<ResubmitArgs, String> {
    let mut manifest = String::new();
    let mut dry_run = false;
    let mut settings = SettingsArgs::default();
    let mut i = 0;

    while i < args.len() {
        if parse_settings_flag(args, &mut i, &mut settings)? {
            i += 1;
            continue;
        }
        match args[i].as_str() {
            "--dry-run" => dry_run = true,
            arg if !arg.starts_with("--") => {
                if manifest.is_empty() {
                    manifest = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    if manifest.is_empty() {
        return Err("Missing required argument: MANIFEST".to_string());
    }

    Ok(ResubmitArgs {
        manifest,
        dry_run,
        settings,
    })
}

fn parse_delivery_args(args: &[String]) -> Result<DeliveryArgs, String> {
    let mut receiver = None;
    let mut date = None;
    let mut comments = String::new();
    let mut json = false;
    let mut settings = SettingsArgs::default();
    let mut i = 0;

    while i < args.len() {
        if parse_settings_flag(args, &mut i, &mut settings)? {
            i += 1;
            continue;
        }
        match args[i].as_str() {
            "--receiver" => receiver = Some(flag_value(args, &mut i, "a name")?),
            "--date" => date = Some(flag_value(args, &mut i, "a date")?),
            "--comments" => comments = flag_value(args, &mut i, "a value")?,
            "--json" => json = true,
            arg => return Err(format!("Unexpected argument: {arg}")),
        }
        i += 1;
    }

    Ok(DeliveryArgs {
        receiver: receiver.ok_or_else(|| "--receiver is required for delivery".to_string())?,
        date: date.ok_or_else(|| "--date is required for delivery".to_string())?,
        comments,
        json,
        settings,
    })
}
