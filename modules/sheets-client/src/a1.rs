//! A1 notation helpers.
//!
//! Columns and rows are 1-based. Column letters use bijective base-26:
//! `1 → A`, `26 → Z`, `27 → AA`, `702 → ZZ`, `703 → AAA`.

/// Convert a 1-based column index to its letters. Returns an empty string for 0.
pub fn column_letter(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Quote a sheet name for use in a range. Embedded quotes are doubled.
pub fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// The whole of one row, e.g. `'Settings'!2:2`.
pub fn row_range(sheet: &str, row: u32) -> String {
    format!("{}!{row}:{row}", quote_sheet(sheet))
}

/// Rows `start..=end`, all columns.
pub fn rows_range(sheet: &str, start_row: u32, end_row: u32) -> String {
    format!("{}!{start_row}:{end_row}", quote_sheet(sheet))
}

/// One cell, e.g. `'Settings'!C4`.
pub fn cell(sheet: &str, row: u32, column: u32) -> String {
    format!("{}!{}{row}", quote_sheet(sheet), column_letter(column))
}

/// One column from `from_row` down to the last populated row, e.g. `'Leads'!B2:B`.
pub fn column_from(sheet: &str, column: u32, from_row: u32) -> String {
    let letter = column_letter(column);
    format!("{}!{letter}{from_row}:{letter}", quote_sheet(sheet))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_are_bijective_base_26() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(702), "ZZ");
        assert_eq!(column_letter(703), "AAA");
        assert_eq!(column_letter(16384), "XFD");
        assert_eq!(column_letter(0), "");
    }

    #[test]
    fn sheet_names_are_quoted() {
        assert_eq!(cell("Niche Settings", 4, 3), "'Niche Settings'!C4");
        assert_eq!(row_range("Bob's", 1), "'Bob''s'!1:1");
        assert_eq!(column_from("Leads", 28, 2), "'Leads'!AB2:AB");
        assert_eq!(rows_range("S", 2, 9), "'S'!2:9");
    }
}
