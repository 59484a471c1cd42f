use sprite_atlas::units::{GIB, KIB, MIB, TIB};

/// Parses `--capacity` values such as `1073741824`, `512MiB` or `2 GiB`.
pub fn parse_capacity(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|character: char| !character.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(format!("capacity {input:?} does not start with a number"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|error| format!("capacity {input:?}: {error}"))?;
    let unit = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kib" => KIB,
        "m" | "mib" => MIB,
        "g" | "gib" => GIB,
        "t" | "tib" => TIB,
        other => return Err(format!("unknown capacity unit {other:?}")),
    };
    value
        .checked_mul(unit)
        .ok_or_else(|| format!("capacity {input:?} overflows 64 bits"))
}

/// Renders a byte count with the largest binary unit that keeps it readable.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(TIB, "TiB"), (GIB, "GiB"), (MIB, "MiB"), (KIB, "KiB")];
    for (unit, name) in UNITS {
        if bytes >= unit {
            return format!("{:.1} {name}", bytes as f64 / unit as f64);
        }
    }
    format!("{bytes} B")
}
