use std::fs::File;
use std::io::{Read, stdin};
use std::path::{Path, PathBuf};

use anyhow::Context;
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL};
use flate2::read::GzDecoder;
use sessionlog::session::field::Field;
use sessionlog::{Document, Record, SessionLog, Track};
use unicode_width::UnicodeWidthStr;

/// Pad to a display width so fullwidth titles keep columns aligned.
fn pad_to_width(s: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(s);
    if w >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - w))
    }
}

/// Read session bytes from a path or stdin ('-').
///
/// Archived sessions compressed with gzip (`.gz`, or gzip magic on stdin)
/// are decompressed.
pub fn read_session_as_vec(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut inbuf = Vec::new();
        stdin()
            .read_to_end(&mut inbuf)
            .context("failed to read from stdin")?;
        if inbuf.len() >= 2 && inbuf[0] == 0x1F && inbuf[1] == 0x8B {
            return gunzip(&inbuf[..]).context("failed to decompress gzip data from stdin");
        }
        return Ok(inbuf);
    }

    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file: {}", path.display()))?;
    let is_gz = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if is_gz {
        gunzip(f).context("failed to decompress .gz input")
    } else {
        let mut out = Vec::new();
        f.read_to_end(&mut out).context("failed to read input file")?;
        Ok(out)
    }
}

fn gunzip<R: Read>(input: R) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(input).read_to_end(&mut out)?;
    Ok(out)
}

fn parse(path: &Path, data: &[u8]) -> Option<SessionLog> {
    match SessionLog::try_from(data) {
        Ok(log) => Some(log),
        Err(e) => {
            eprintln!("\"{}\": parse error: {}", path.display(), e);
            None
        }
    }
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn summarize(log: &SessionLog) -> Vec<(String, String)> {
    let document = Document::build(log);
    let mut tracks = 0;
    let mut tombstones = 0;
    let mut unknown = 0;
    for record in log {
        match record {
            Record::Track(_) => tracks += 1,
            Record::Tombstone(_) => tombstones += 1,
            Record::Unknown { .. } => unknown += 1,
            Record::Version(_) => {}
        }
    }
    let mut decks: Vec<i64> = document.tracks().filter_map(|t| t.deck).collect();
    decks.sort_unstable();
    decks.dedup();
    let played = document.tracks().filter(|t| t.played).count();

    vec![
        ("Version".into(), log.version.clone().unwrap_or_default()),
        ("Records".into(), log.records.len().to_string()),
        ("Track records".into(), tracks.to_string()),
        ("Delete markers".into(), tombstones.to_string()),
        ("Unknown chunks".into(), unknown.to_string()),
        ("Rows".into(), document.len().to_string()),
        ("Live tracks".into(), document.tracks().count().to_string()),
        ("Played".into(), played.to_string()),
        (
            "Decks".into(),
            decks
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ),
    ]
}

fn display_summary(rows: &[(String, String)]) {
    let col0 = rows
        .iter()
        .map(|(k, _)| UnicodeWidthStr::width(k.as_str()))
        .max()
        .unwrap_or(0)
        .max(UnicodeWidthStr::width("Field"));
    println!("{}  Value", pad_to_width("Field", col0));
    for (k, v) in rows {
        println!("{}  {}", pad_to_width(k, col0), v);
    }
}

/// Print summary counts for a session file.
pub fn info(path: &Path, data: Vec<u8>) -> anyhow::Result<()> {
    let Some(log) = parse(path, &data) else {
        return Ok(());
    };
    display_summary(&summarize(&log));
    Ok(())
}

fn track_row(track: &Track) -> Vec<Cell> {
    vec![
        Cell::new(track.row),
        Cell::new(opt(track.deck)),
        Cell::new(format!("{:?}", track.status())),
        Cell::new(track.artist.as_deref().unwrap_or("")),
        Cell::new(track.title.as_deref().unwrap_or("")),
        Cell::new(track.length.as_deref().unwrap_or("")),
        Cell::new(opt(track.start_time)),
        Cell::new(opt(track.end_time)),
        Cell::new(opt(track.updated_at)),
    ]
}

fn extra_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| format!("{}={}", f.name(), f.value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print records as a table.
///
/// `dedup` prints one merged track per row instead of every record.
pub fn dump(path: &Path, data: Vec<u8>, dedup: bool, extra: bool) -> anyhow::Result<()> {
    let Some(log) = parse(path, &data) else {
        return Ok(());
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let mut header = vec![
        "Row", "Deck", "Status", "Artist", "Title", "Length", "Start", "End", "Updated",
    ];
    if extra {
        header.push("Extra");
    }
    table.set_header(header);

    let width = if extra { 10 } else { 9 };
    let cells_for = |track: &Track| {
        let mut cells = track_row(track);
        if extra {
            cells.push(Cell::new(extra_fields(&track.extra)));
        }
        cells
    };
    if dedup {
        for track in log.dedup_for_storage() {
            table.add_row(cells_for(&track));
        }
    } else {
        for record in &log {
            match record {
                Record::Track(track) => {
                    table.add_row(cells_for(track));
                }
                Record::Tombstone(t) => {
                    let mut cells = vec![Cell::new(t.row), Cell::new(""), Cell::new("Deleted")];
                    cells.resize_with(width, || Cell::new(""));
                    table.add_row(cells);
                }
                Record::Version(_) | Record::Unknown { .. } => {}
            }
        }
    }
    println!("{table}");
    Ok(())
}

/// Parse, serialize and re-parse, then compare the decoded records.
///
/// Unknown chunks only keep their length, so the comparison is on records
/// rather than bytes.
pub fn test_roundtrip(path: &Path, data: Vec<u8>) -> anyhow::Result<()> {
    let Some(original) = parse(path, &data) else {
        return Ok(());
    };
    let bytes: Vec<u8> = (&original).into();
    let rebuilt = SessionLog::try_from(bytes.as_slice())
        .with_context(|| format!("re-parse of serialized {} failed", path.display()))?;

    if bytes == data {
        println!("\"{}\": OK (bytes identical)", path.display());
        return Ok(());
    }
    if rebuilt == original {
        println!(
            "\"{}\": OK (records identical, {} -> {} bytes)",
            path.display(),
            data.len(),
            bytes.len()
        );
        return Ok(());
    }
    let first = original
        .records
        .iter()
        .zip(&rebuilt.records)
        .position(|(a, b)| a != b)
        .unwrap_or(original.records.len().min(rebuilt.records.len()));
    anyhow::bail!(
        "\"{}\": records differ at index {} ({} vs {} records)",
        path.display(),
        first,
        original.records.len(),
        rebuilt.records.len()
    )
}
