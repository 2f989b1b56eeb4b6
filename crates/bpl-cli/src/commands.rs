use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use bpl_codec::{Decoder, Trailer};
use bpl_types::{Object, ObjectTable};
use colored::Colorize;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cli::*;
use crate::config::{Config, DestinationConfig};
use crate::destination;

/// Longest data payload printed in full by `inspect`.
const DATA_PREVIEW_LEN: usize = 16;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Destination(args) => cmd_destination(args),
        Command::Inspect(args) => cmd_inspect(args, &cli.format),
        Command::Verify(args) => cmd_verify(args),
    }
}

/// Merge the config file (if any) and command-line overrides.
fn destination_config(args: &DestinationArgs) -> anyhow::Result<DestinationConfig> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?.destination,
        None => DestinationConfig::default(),
    };
    if let Some(name) = &args.name {
        config.name = name.clone();
    }
    if let Some(app) = &args.app {
        config.app_path = app.clone();
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    Ok(config)
}

fn cmd_destination(args: DestinationArgs) -> anyhow::Result<()> {
    let config = destination_config(&args)?;
    let uuid = match &args.uuid {
        Some(raw) => Uuid::parse_str(raw)
            .with_context(|| format!("invalid UUID {raw}"))?
            .to_string()
            .to_uppercase(),
        None => destination::new_uuid(),
    };
    debug!(?config, %uuid, "building share destination");

    let written = write_destination(&config, &uuid)?;
    info!(path = %config.output.display(), bytes = written, "wrote share destination");

    println!(
        "{} Created {}",
        "✓".green().bold(),
        config.output.display().to_string().bold()
    );
    println!("  Name: {}", config.name.yellow());
    println!("  App: {}", config.app_path);
    println!("  UUID: {}", uuid.cyan());
    print_next_steps(&config);
    Ok(())
}

fn write_destination(config: &DestinationConfig, uuid: &str) -> anyhow::Result<usize> {
    let archive = destination::build(config, uuid)?;
    write_archive(&archive, &config.output)
}

/// Encode fully before opening `path`, so a failed encode leaves any
/// existing file in place.
fn write_archive(archive: &bpl_archive::Archive, path: &Path) -> anyhow::Result<usize> {
    let bytes = archive.encode().context("failed to encode archive")?;
    fs::write(path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(bytes.len())
}

fn print_next_steps(config: &DestinationConfig) {
    let app = Path::new(&config.app_path);
    let bundle = app
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.app_path.clone());
    let install_dir = app
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "/Applications".into());

    println!("\n{}", "Next steps:".bold());
    println!("1. Build the app:");
    println!("   xcodebuild -project Moplug-Send-Motion.xcodeproj -configuration Release");
    println!("\n2. Copy the app to {install_dir}:");
    println!("   sudo cp -R 'build/Release/{bundle}' '{install_dir}/'");
    println!("\n3. Copy the destination to the share destinations folder:");
    println!(
        "   sudo cp '{}' '/Library/Application Support/ProApps/Share Destinations/'",
        config.output.display()
    );
    println!("\n4. Restart Final Cut Pro");
    println!("\n5. Look for '{}' in File > Share", config.name.yellow());
}

fn read_table(path: &Path) -> anyhow::Result<(Vec<u8>, Trailer, ObjectTable)> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let decoder = Decoder::new(&bytes);
    let trailer = decoder
        .trailer()
        .with_context(|| format!("{} is not a binary property list", path.display()))?;
    let table = decoder
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?;
    Ok((bytes, trailer, table))
}

#[derive(Serialize)]
struct InspectReport<'a> {
    file: &'a Path,
    bytes: usize,
    offset_width: u8,
    ref_width: u8,
    object_count: u64,
    root: u64,
    offset_table_offset: u64,
    table: &'a ObjectTable,
}

fn cmd_inspect(args: InspectArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let (bytes, trailer, table) = read_table(&args.file)?;
    match format {
        OutputFormat::Json => {
            let report = InspectReport {
                file: &args.file,
                bytes: bytes.len(),
                offset_width: trailer.offset_width,
                ref_width: trailer.ref_width,
                object_count: trailer.object_count,
                root: trailer.root,
                offset_table_offset: trailer.offset_table_offset,
                table: &table,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{} ({} bytes)", args.file.display().to_string().bold(), bytes.len());
            println!(
                "  Objects: {}  Root: {}  Ref width: {}  Offset width: {}  Offset table: {}",
                trailer.object_count,
                trailer.root.to_string().yellow(),
                trailer.ref_width,
                trailer.offset_width,
                trailer.offset_table_offset
            );
            for (slot, object) in table.iter() {
                let marker = if slot == table.root() { "*" } else { " " };
                println!("{marker}{}  {}", format!("{:>5}", slot.index()).dimmed(), describe(object));
            }
        }
    }
    Ok(())
}

/// One-line rendering of an object for `inspect`.
fn describe(object: &Object) -> String {
    fn refs(slots: &[bpl_types::Slot]) -> String {
        slots.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
    }
    match object {
        Object::Null => "null".into(),
        Object::Bool(b) => format!("bool {b}"),
        Object::Integer(i) => format!("int {i}"),
        Object::Real(r) => format!("real {r}"),
        Object::Date(d) => match d.to_datetime() {
            Some(dt) => format!("date {}", dt.to_rfc3339()),
            None => format!("date {}", d.plist_secs()),
        },
        Object::Data(bytes) if bytes.len() > DATA_PREVIEW_LEN => format!(
            "data[{}] {}…",
            bytes.len(),
            hex::encode(&bytes[..DATA_PREVIEW_LEN])
        ),
        Object::Data(bytes) => format!("data[{}] {}", bytes.len(), hex::encode(bytes)),
        Object::String(s) => format!("string {s:?}"),
        Object::Uid(u) => format!("uid {}", u.get()),
        Object::Array(items) => format!("array [{}]", refs(items)),
        Object::Set(items) => format!("set [{}]", refs(items)),
        Object::Dict(entries) => format!(
            "dict {{{}}}",
            entries
                .iter()
                .map(|(k, v)| format!("{k} -> {v}"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Position of the first differing byte, or `None` when equal.
fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    if a == b {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .position(|(x, y)| x != y)
            .unwrap_or_else(|| a.len().min(b.len())),
    )
}

fn verify_file(path: &Path) -> anyhow::Result<ObjectTable> {
    let (bytes, _, table) = read_table(path)?;
    let reencoded = bpl_codec::encode(&table)
        .with_context(|| format!("failed to re-encode {}", path.display()))?;
    if let Some(pos) = first_difference(&bytes, &reencoded) {
        bail!(
            "{} does not re-encode identically: first difference at byte {pos} ({} vs {} bytes)",
            path.display(),
            bytes.len(),
            reencoded.len()
        );
    }
    Ok(table)
}

fn cmd_verify(args: VerifyArgs) -> anyhow::Result<()> {
    match verify_file(&args.file) {
        Ok(table) => {
            println!(
                "{} {} re-encodes byte for byte",
                "✓".green().bold(),
                args.file.display()
            );
            println!("  Objects: {}", table.len());
            println!("  Root: {}", table.root().to_string().yellow());
            Ok(())
        }
        Err(err) => {
            println!("{} {}", "✗".red().bold(), args.file.display());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use bpl_types::{Date, Slot, Uid};

    fn args_for(output: PathBuf) -> DestinationArgs {
        DestinationArgs {
            config: None,
            name: None,
            app: None,
            uuid: Some("6f1c2a4e-9b7d-4e21-8c3a-0d5e7f9a1b2c".into()),
            output: Some(output),
        }
    }

    #[test]
    fn destination_writes_verifiable_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dest.fcpxdest");
        cmd_destination(args_for(out.clone())).unwrap();

        let bytes = fs::read(&out).unwrap();
        assert_eq!(&bytes[..8], b"bplist00");
        let table = verify_file(&out).unwrap();
        let uuid = Object::String("6F1C2A4E-9B7D-4E21-8C3A-0D5E7F9A1B2C".into());
        assert!(table.iter().any(|(_, o)| o == &uuid));
    }

    #[test]
    fn failed_encode_leaves_existing_file_untouched() {
        let mut ar = bpl_archive::KeyedArchiver::new();
        let big = ar.archive_value(bpl_types::Value::Integer(i128::MAX));
        let archive = ar.finish(big).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("dest.fcpxdest");
        fs::write(&existing, "old").unwrap();
        assert!(write_archive(&archive, &existing).is_err());
        assert_eq!(fs::read_to_string(&existing).unwrap(), "old");

        let fresh = dir.path().join("fresh.fcpxdest");
        assert!(write_archive(&archive, &fresh).is_err());
        assert!(!fresh.exists());
    }

    #[test]
    fn destination_rejects_bad_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args_for(dir.path().join("dest.fcpxdest"));
        args.uuid = Some("not-a-uuid".into());
        let err = cmd_destination(args).unwrap_err();
        assert!(err.to_string().contains("invalid UUID"));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bpl.toml");
        fs::write(
            &config_path,
            "[destination]\nname = \"From File\"\naudio_setting = \"Linear PCM\"\n",
        )
        .unwrap();
        let mut args = args_for(dir.path().join("x.fcpxdest"));
        args.config = Some(config_path);
        args.name = Some("From Flag".into());

        let config = destination_config(&args).unwrap();
        assert_eq!(config.name, "From Flag");
        assert_eq!(config.audio_setting, "Linear PCM");
        assert_eq!(config.output, dir.path().join("x.fcpxdest"));
    }

    #[test]
    fn verify_rejects_non_canonical_file() {
        // Integer 5 written with two bytes where one suffices.
        let mut bytes = b"bplist00".to_vec();
        bytes.extend_from_slice(&[0x11, 0x00, 0x05]);
        bytes.push(8);
        let trailer = Trailer {
            sort_version: 0,
            offset_width: 1,
            ref_width: 1,
            object_count: 1,
            root: 0,
            offset_table_offset: 11,
        };
        bytes.extend_from_slice(&trailer.to_bytes());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.plist");
        fs::write(&path, &bytes).unwrap();
        let err = verify_file(&path).unwrap_err();
        assert!(err.to_string().contains("first difference at byte 8"));
    }

    #[test]
    fn inspect_reports_missing_file() {
        let args = InspectArgs {
            file: PathBuf::from("/nonexistent/file.plist"),
        };
        let err = cmd_inspect(args, &OutputFormat::Text).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn inspect_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage");
        fs::write(&path, [0u8; 64]).unwrap();
        let err = cmd_inspect(InspectArgs { file: path }, &OutputFormat::Json).unwrap_err();
        assert!(err.to_string().contains("is not a binary property list"));
    }

    #[test]
    fn json_report_includes_table() {
        let table = ObjectTable::new(vec![Object::Uid(Uid(29))], Slot(0));
        let report = InspectReport {
            file: Path::new("a.plist"),
            bytes: 44,
            offset_width: 1,
            ref_width: 1,
            object_count: 1,
            root: 0,
            offset_table_offset: 10,
            table: &table,
        };
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["object_count"], 1);
        assert_eq!(json["table"]["objects"][0]["type"], "uid");
        assert_eq!(json["table"]["objects"][0]["value"], 29);
    }

    #[test]
    fn describe_objects() {
        assert_eq!(describe(&Object::Null), "null");
        assert_eq!(describe(&Object::String("AAC".into())), "string \"AAC\"");
        assert_eq!(
            describe(&Object::Dict(vec![(Slot(3), Slot(1))])),
            "dict {3 -> 1}"
        );
        assert_eq!(describe(&Object::Array(vec![Slot(0), Slot(2)])), "array [0, 2]");
        assert_eq!(describe(&Object::Data(vec![0xAB, 0xCD])), "data[2] abcd");
        assert!(describe(&Object::Data(vec![0; 40])).starts_with("data[40] 0000"));
        assert_eq!(
            describe(&Object::Date(Date::from_plist_secs(0.0))),
            "date 2001-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn first_difference_positions() {
        assert_eq!(first_difference(b"abc", b"abc"), None);
        assert_eq!(first_difference(b"abc", b"abd"), Some(2));
        assert_eq!(first_difference(b"ab", b"abc"), Some(2));
    }
}
