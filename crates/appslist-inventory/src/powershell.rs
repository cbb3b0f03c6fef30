//! PowerShell invocation helpers
//!
//! Scripts are passed with `-EncodedCommand` and always write UTF-8 to stdout,
//! whatever the console code page.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Windows PowerShell executable
pub const POWERSHELL_EXE: &str = "powershell.exe";

/// Switches stdout to UTF-8 without a byte order mark
const UTF8_OUTPUT: &str = "[Console]::OutputEncoding = New-Object System.Text.UTF8Encoding $false\n";

/// Command line arguments running `script` non-interactively
#[must_use]
pub fn arguments(script: &str) -> [String; 4] {
    [
        "-NoProfile".to_string(),
        "-NonInteractive".to_string(),
        "-EncodedCommand".to_string(),
        encode_script(script),
    ]
}

/// `script`, prefixed with the UTF-8 switch, as base64 UTF-16LE
#[must_use]
pub fn encode_script(script: &str) -> String {
    let utf16: Vec<u8> = format!("{UTF8_OUTPUT}{script}")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
    STANDARD.encode(utf16)
}

/// Decode captured stdout, dropping a byte order mark if one slipped through
#[must_use]
pub fn decode_output(stdout: &[u8]) -> String {
    let text = String::from_utf8_lossy(stdout);
    text.trim_start_matches('\u{feff}').to_string()
}

/// Quote `value` as a single-quoted PowerShell string literal
#[must_use]
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_script_is_utf16le_with_utf8_switch() {
        let bytes = STANDARD.decode(encode_script("Write-Output 'Café'")).unwrap();
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let script = String::from_utf16(&units).unwrap();

        assert!(script.starts_with("[Console]::OutputEncoding"));
        assert!(script.ends_with("Write-Output 'Café'"));
    }

    #[test]
    fn test_decode_output_keeps_non_ascii() {
        let mut stdout = vec![0xEF, 0xBB, 0xBF];
        stdout.extend_from_slice("Café 微信".as_bytes());

        assert_eq!(decode_output(&stdout), "Café 微信");
    }

    #[test]
    fn test_quote_doubles_single_quotes() {
        assert_eq!(quote(r"HKLM\O'Brien Tools"), r"'HKLM\O''Brien Tools'");
    }
}
