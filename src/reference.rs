pub const TAG_PAYLOAD_FORMAT: &str = "00";
pub const TAG_INITIATION_METHOD: &str = "01";
pub const TAG_MERCHANT_ACCOUNT: &str = "26";
pub const TAG_MERCHANT_TAX_ID: &str = "50";
pub const TAG_CATEGORY_CODE: &str = "52";
pub const TAG_CURRENCY: &str = "53";
pub const TAG_AMOUNT: &str = "54";
pub const TAG_COUNTRY: &str = "58";
pub const TAG_MERCHANT_NAME: &str = "59";
pub const TAG_MERCHANT_CITY: &str = "60";
pub const TAG_ADDITIONAL_DATA: &str = "62";
pub const TAG_CRC: &str = "63";

pub const SUBTAG_ACCOUNT_GUI: &str = "00";
pub const SUBTAG_ACCOUNT_MERCHANT_ID: &str = "01";
pub const SUBTAG_ACCOUNT_REFERENCE: &str = "02";

pub const SUBTAG_BILL_NUMBER: &str = "01";
pub const SUBTAG_CUSTOMER_ID: &str = "02";
pub const SUBTAG_DUE_DATE: &str = "03";

pub const PAYLOAD_FORMAT_VALUE: &str = "01";
/// Static code: the same QR may be paid more than once.
pub const INITIATION_STATIC: &str = "12";

/// Tag and length of the CRC field, appended before computing the checksum.
pub const CRC_HEADER: &str = "6304";
pub const CRC_VALUE_LEN: usize = 4;

pub const MAX_NAME_LEN: usize = 25;
pub const MAX_CITY_LEN: usize = 15;
/// Largest value a two-digit length prefix can describe.
pub const MAX_VALUE_LEN: usize = 99;

pub const DEFAULT_ACCOUNT_GUI: &str = "ar.com.cooperativapopular";
pub const DEFAULT_MERCHANT_ID: &str = "COOPE_001";
pub const DEFAULT_REFERENCE: &str = "TAS";
pub const DEFAULT_CATEGORY_CODE: &str = "4814";
pub const DEFAULT_CURRENCY: &str = "032";
pub const DEFAULT_COUNTRY: &str = "AR";
pub const DEFAULT_MERCHANT_NAME: &str = "COOPERATIVA POPULAR";
pub const DEFAULT_MERCHANT_CITY: &str = "RIVADAVIA";

pub const QR_IMAGE_SERVICE: &str = "https://api.qrserver.com/v1/create-qr-code/";
pub const QR_IMAGE_SIZE: u32 = 300;

pub const TAG_LABELS: &[(&str, &str)] = &[
    ("00", "Payload Format Indicator"),
    ("01", "Point of Initiation Method"),
    ("26", "Merchant Account Information"),
    ("50", "Merchant Tax ID"),
    ("52", "Merchant Category Code"),
    ("53", "Transaction Currency"),
    ("54", "Transaction Amount"),
    ("58", "Country Code"),
    ("59", "Merchant Name"),
    ("60", "Merchant City"),
    ("62", "Additional Data Field Template"),
    ("63", "CRC"),
];

pub const ACCOUNT_LABELS: &[(&str, &str)] = &[
    ("00", "Globally Unique Identifier"),
    ("01", "Merchant ID"),
    ("02", "Reference"),
];

pub const ADDITIONAL_DATA_LABELS: &[(&str, &str)] = &[
    ("01", "Bill Number"),
    ("02", "Customer ID"),
    ("03", "Due Date"),
];

pub fn tag_label(tag: &str) -> &'static str {
    lookup(TAG_LABELS, tag)
}

/// Label of a sub-field inside the template carried by `parent`.
pub fn subtag_label(parent: &str, tag: &str) -> &'static str {
    match parent {
        TAG_MERCHANT_ACCOUNT => lookup(ACCOUNT_LABELS, tag),
        TAG_ADDITIONAL_DATA => lookup(ADDITIONAL_DATA_LABELS, tag),
        _ => "Unknown",
    }
}

pub fn is_template(tag: &str) -> bool {
    tag == TAG_MERCHANT_ACCOUNT || tag == TAG_ADDITIONAL_DATA
}

fn lookup(table: &[(&str, &'static str)], tag: &str) -> &'static str {
    table
        .iter()
        .find(|(code, _)| *code == tag)
        .map(|(_, label)| *label)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_known_tags() {
        assert_eq!(tag_label("59"), "Merchant Name");
        assert_eq!(tag_label("99"), "Unknown");
        assert_eq!(subtag_label("62", "03"), "Due Date");
        assert_eq!(subtag_label("26", "00"), "Globally Unique Identifier");
        assert_eq!(subtag_label("54", "01"), "Unknown");
    }

    #[test]
    fn only_account_and_additional_data_are_templates() {
        assert!(is_template("26"));
        assert!(is_template("62"));
        assert!(!is_template("59"));
    }
}
