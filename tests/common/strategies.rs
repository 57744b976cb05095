use proptest::prelude::*;

/// Strategy for generating valid device addresses in mixed case
pub fn dev_addr_strategy() -> impl Strategy<Value = String> {
    "[0-9a-fA-F]{8}"
}

/// Strategy for generating valid application EUIs
pub fn app_eui_strategy() -> impl Strategy<Value = String> {
    "[0-9a-fA-F]{16}"
}

/// Strategy for generating valid network session keys
pub fn nwk_s_key_strategy() -> impl Strategy<Value = String> {
    "[0-9a-fA-F]{32}"
}

/// Strategy for generating hex strings of the wrong length for a device address
pub fn wrong_length_hex_strategy() -> impl Strategy<Value = String> {
    "[0-9a-fA-F]{0,16}".prop_filter("must not be 8 digits", |s| s.len() != 8)
}

/// Strategy for generating 8-character strings with at least one non-hex character
pub fn non_hex_dev_addr_strategy() -> impl Strategy<Value = String> {
    ("[0-9a-fA-F]{7}", "[g-zG-Z!#%]", 0usize..8).prop_map(|(hex, bad, position)| {
        let mut chars: Vec<char> = hex.chars().collect();
        chars.insert(position, bad.chars().next().unwrap_or('z'));
        chars.into_iter().collect()
    })
}
