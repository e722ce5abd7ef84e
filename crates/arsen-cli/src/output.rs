//! Formatted output helpers for CLI commands.
//!
//! Plain tables for people, pretty JSON for scripts.

use serde::Serialize;

fn row_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(c, &w)| format!("{c:<w$}"))
        .collect();
    padded.join("  ").trim_end().to_string()
}

/// Left-aligned columns separated by two spaces, widths taken from the
/// widest cell. Trailing padding is trimmed.
#[must_use]
pub fn table<R: AsRef<[String]>>(headers: &[&str], rows: &[R]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.as_ref()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = row_line(headers.iter().copied(), &widths);
    for row in rows {
        out.push('\n');
        out.push_str(&row_line(row.as_ref().iter().map(String::as_str), &widths));
    }
    out
}

/// Prints `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Formats a byte count into a human-readable string (e.g., "12.5 KiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;

    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_to_widest_cell() {
        let rows = vec![
            vec![".text".to_string(), "r-x".to_string()],
            vec![".rodata".to_string(), "r--".to_string()],
        ];
        assert_eq!(
            table(&["NAME", "PERMS"], &rows),
            "NAME     PERMS\n.text    r-x\n.rodata  r--"
        );
    }

    #[test]
    fn table_without_rows_is_header_only() {
        let rows: Vec<Vec<String>> = Vec::new();
        assert_eq!(table(&["A", "B"], &rows), "A  B");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(12_800), "12.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }
}
