// Protocol encodings -> typed values. Total: bad input is zero / not-a-contract.

const EMPTY_CODE: &str = "0x";

/// Hex quantity (`"0x1a"`, `"1a"`) to integer. Absent, empty, non-hex and
/// overflowing values all read as 0.
pub fn hex_to_int(value: Option<&str>) -> u128 {
    let Some(raw) = value else {
        return 0;
    };

    let raw = raw.trim();
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);

    // from_str_radix would accept a leading '+'
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        log::debug!("treating malformed quantity {:?} as zero", raw);
        return 0;
    }

    u128::from_str_radix(digits, 16).unwrap_or_else(|_| {
        log::debug!("quantity {:?} overflows, treating as zero", raw);
        0
    })
}

/// An address is a contract when the node returns code longer than `"0x"`.
pub fn is_contract_code(code: Option<&str>) -> bool {
    match code {
        Some(code) => code != EMPTY_CODE && code.len() > EMPTY_CODE.len(),
        None => false,
    }
}
