//! Eclipse copy CLI (ecp) - Main binary entry point

use eclipse_ingest::cli::args::{
    CopyArgs, DeliveryArgs, GatherArgs, ResolveArgs, ResubmitArgs, SettingsArgs, parse_args,
    Command,
};
use eclipse_ingest::cli::output::{
    OutcomeReport, format_drive_text, format_gather_text, format_json, format_outcome_text,
    format_target_text,
};
use eclipse_ingest::config::{ResolvedSettings, Settings};
use eclipse_ingest::io::{CopyManifest, resubmit_pending, write_manifest};
use eclipse_ingest::models::DeliveryRecord;
use eclipse_ingest::services::delivery::register_delivery;
use eclipse_ingest::services::sink::MetadataSink;
use eclipse_ingest::services::sink::http::HttpSink;
use eclipse_ingest::services::sink::memory::MemorySink;
use eclipse_ingest::services::system::HostSystem;
use eclipse_ingest::{
    CopyContext, CopyJob, DestinationResolver, Error, FolderMapping, gather_files,
};
use std::path::Path;
use std::process;

fn main() {
    // Initialize logger (controlled by RUST_LOG environment variable)
    // Example: RUST_LOG=debug ecp copy /media/drive //nas/share --nas-id 1 --delivery-id 2
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_help();
            return;
        }
        "--version" | "-v" => {
            print_version();
            return;
        }
        _ => {}
    }

    let cli_args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    };

    let result = match &cli_args.command {
        Command::Gather(gather_args) => handle_gather(gather_args),
        Command::Resolve(resolve_args) => handle_resolve(resolve_args),
        Command::Copy(copy_args) => handle_copy(copy_args),
        Command::Resubmit(resubmit_args) => handle_resubmit(resubmit_args),
        Command::Delivery(delivery_args) => handle_delivery(delivery_args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code_for(&e)
        }
    };

    process::exit(exit_code);
}

fn exit_code_for(error: &Error) -> i32 {
    if error.is_configuration() { 2 } else { 4 }
}

fn load_settings(args: &SettingsArgs) -> Result<ResolvedSettings, Error> {
    Settings::load(args.config.as_deref().map(Path::new), &args.overrides)?.finalize()
}

fn mapping_by_name(name: &str) -> Result<FolderMapping, Error> {
    FolderMapping::by_name(name).ok_or_else(|| {
        Error::InvalidInput(format!(
            "unknown mapping '{name}' (available: {})",
            FolderMapping::available().join(", ")
        ))
    })
}

fn sink_for(settings: &ResolvedSettings, dry_run: bool) -> Result<Box<dyn MetadataSink>, Error> {
    if dry_run {
        eprintln!("Dry run: metadata is not sent to {}", settings.api_url);
        return Ok(Box::new(MemorySink::new()));
    }
    Ok(Box::new(HttpSink::new(
        &settings.api_url,
        settings.request_timeout,
    )?))
}

fn handle_gather(args: &GatherArgs) -> Result<i32, Error> {
    let mut mapping = mapping_by_name(&args.mapping)?;
    if !args.categories.is_empty() {
        mapping = mapping.restricted_to(&args.categories)?;
    }
    let files = gather_files(&args.source, &mapping)?;

    if args.json {
        println!("{}", format_json(&files));
    } else {
        print!("{}", format_gather_text(&files));
    }
    Ok(0)
}

fn handle_resolve(args: &ResolveArgs) -> Result<i32, Error> {
    let settings = load_settings(&args.settings)?;
    let system = HostSystem;
    let resolver = DestinationResolver::new(&system);
    let target = resolver.resolve(&args.destination, settings.port)?;
    let reachable = args.probe.then(|| target.probe_reachable(&system));

    if args.json {
        println!(
            "{}",
            format_json(&serde_json::json!({
                "target": &target,
                "reachable": reachable,
            }))
        );
    } else {
        print!("{}", format_target_text(&target, reachable));
    }

    Ok(if reachable == Some(false) { 3 } else { 0 })
}

fn handle_copy(args: &CopyArgs) -> Result<i32, Error> {
    let settings = load_settings(&args.settings)?;
    let mapping = mapping_by_name(&args.mapping)?;
    let system = HostSystem;

    let target = DestinationResolver::new(&system).resolve(&args.destination, settings.port)?;

    let mut job = CopyJob::new(&args.source, &mapping, &system)?;
    job.set_identifiers(args.nas_id, args.delivery_id);
    job.set_destination(target);
    job.set_layout(settings.layout);

    eprintln!(
        "Copying {} file(s) from {}",
        job.files().len(),
        job.source().display()
    );
    eprint!("{}", format_drive_text(job.drive()));

    let sink = sink_for(&settings, args.dry_run)?;
    let ctx = CopyContext::new(&*sink, &system);
    let outcome = job.copy(&ctx)?;

    let manifest = CopyManifest::from_copy(&job, &outcome);
    if let Some(path) = &args.manifest {
        write_manifest(Path::new(path), &manifest)?;
        eprintln!("Manifest saved: {path}");
    }

    if args.json {
        let report = OutcomeReport {
            copied: &outcome.copied,
            failures: &outcome.failures,
            records_submitted: outcome.records_submitted,
            record_count: outcome.records.len(),
            drive: job.drive(),
            manifest: args.manifest.as_ref().map(|_| &manifest),
        };
        println!("{}", format_json(&report));
    } else {
        print!("{}", format_outcome_text(&outcome));
    }

    if !outcome.records_submitted && args.manifest.is_none() {
        eprintln!("Warning: file records were not submitted; use --manifest to keep them");
    }

    Ok(if outcome.is_success() { 0 } else { 3 })
}

fn handle_resubmit(args: &ResubmitArgs) -> Result<i32, Error> {
    let settings = load_settings(&args.settings)?;
    let sink = sink_for(&settings, args.dry_run)?;
    let result = resubmit_pending(Path::new(&args.manifest), &*sink)?;

    if result.pending == 0 {
        println!("Nothing to re-submit.");
        return Ok(0);
    }
    if result.submitted {
        println!("Re-submitted {} record(s).", result.pending);
        Ok(0)
    } else {
        println!("{} record(s) are still pending.", result.pending);
        Ok(3)
    }
}

fn handle_delivery(args: &DeliveryArgs) -> Result<i32, Error> {
    let settings = load_settings(&args.settings)?;
    let sink = HttpSink::new(&settings.api_url, settings.request_timeout)?;
    let delivery = DeliveryRecord::new(
        args.receiver.clone(),
        args.date.clone(),
        args.comments.clone(),
    );

    let reply = register_delivery(&sink, &delivery)?;
    if args.json {
        println!("{}", format_json(&reply));
    } else {
        let id = reply
            .get("delivery_id")
            .or_else(|| reply.get("id"))
            .map_or_else(|| "?".to_string(), ToString::to_string);
        println!("Registered delivery {id} for {} on {}", args.receiver, args.date);
    }
    Ok(0)
}

fn print_help() {
    println!("Eclipse copy CLI (ecp) - Catalogue field drives and copy them to network storage");
    println!();
    println!("USAGE:");
    println!("    ecp gather <SOURCE> [OPTIONS]");
    println!("    ecp resolve <DESTINATION> [OPTIONS]");
    println!("    ecp copy <SOURCE> <DESTINATION> --nas-id <ID> --delivery-id <ID> [OPTIONS]");
    println!("    ecp resubmit <MANIFEST> [OPTIONS]");
    println!("    ecp delivery --receiver <NAME> --date <DATE> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    gather    List the files a folder mapping picks up from a drive");
    println!("    resolve   Resolve a destination descriptor to an address and copy root");
    println!("    copy      Copy a drive to network storage and submit its metadata");
    println!("    resubmit  Re-post file records left pending by an earlier copy");
    println!("    delivery  Register a drive delivery");
    println!();
    println!("GLOBAL OPTIONS:");
    println!("    -h, --help                 Show this help message");
    println!("    -v, --version              Show version information");
    println!();
    println!("SETTINGS OPTIONS (resolve, copy, resubmit, delivery):");
    println!("    --config <FILE>           TOML settings file");
    println!("    --api-url <URL>           Metadata backend (default: http://127.0.0.1:8000)");
    println!("    --port <N>                Destination port, 1024-65535 (default: 8000)");
    println!("    --layout <NAME>           Destination layout: mirror (default) or category");
    println!();
    println!("GATHER / COPY OPTIONS:");
    println!("    --mapping <NAME>          Folder mapping (default: riprocess-geobc)");
    println!("    --category <NAME>         Only list this category (gather, repeatable)");
    println!("    --manifest <FILE>         Save a Parquet manifest of the copy run");
    println!("    --dry-run                 Keep metadata in memory instead of posting it");
    println!("    --json                    Emit machine-readable output");
    println!();
    println!("RESOLVE OPTIONS:");
    println!("    --probe                   Open a TCP connection to address:port");
    println!();
    println!("DESTINATIONS:");
    println!("    192.168.1.10              IPv4 address of a mounted share");
    println!("    \\\\192.168.1.10\\share      UNC path");
    println!("    Z:                        Mapped network drive (Windows)");
    println!("    nas01:/export/data        Network mount descriptor");
    println!("    /mnt/nas/incoming         Path on a network filesystem mount");
    println!();
    println!("ENVIRONMENT:");
    println!("    ECP_API_URL, ECP_PORT     Override settings file values");
    println!("    RUST_LOG                  Log level (error, warn, info, debug, trace)");
    println!();
    println!("EXAMPLES:");
    println!("    ecp gather /media/field_drive --json");
    println!("    ecp copy /media/field_drive /mnt/nas/incoming --nas-id 3 --delivery-id 17 --manifest run.parquet");
    println!("    ecp resubmit run.parquet");
}

fn print_version() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_DATE: &str = env!("GIT_DATE");
    const BUILD_TARGET: &str = env!("BUILD_TARGET");

    println!("ecp {VERSION}");
    println!("Commit: {GIT_HASH} ({GIT_DATE})");
    println!("Target: {BUILD_TARGET}");

    #[cfg(debug_assertions)]
    println!("Build: debug");
    #[cfg(not(debug_assertions))]
    println!("Build: release");
}
