//! Normalized field vocabulary shared by extractors and form schemas

pub const FULL_NAME: &str = "fullName";
pub const DATE_OF_BIRTH: &str = "dateOfBirth";
pub const PASSPORT_NUMBER: &str = "passportNumber";
pub const NATIONALITY: &str = "nationality";
pub const EMAIL: &str = "email";
pub const PHONE: &str = "phone";
pub const ADDRESS: &str = "address";
pub const CITY: &str = "city";
pub const ZIP_CODE: &str = "zipCode";
pub const OCCUPATION: &str = "occupation";
pub const EMPLOYER: &str = "employer";
pub const PURPOSE_OF_VISIT: &str = "purposeOfVisit";
pub const TRAVEL_DATES: &str = "travelDates";
pub const ACCOMMODATION: &str = "accommodation";
pub const EMERGENCY_CONTACT: &str = "emergencyContact";
pub const MONTHLY_INCOME: &str = "monthlyIncome";
pub const BANK_NAME: &str = "bankName";

/// Every field id an extractor may emit
pub const FIELD_IDS: &[&str] = &[
    FULL_NAME,
    DATE_OF_BIRTH,
    PASSPORT_NUMBER,
    NATIONALITY,
    EMAIL,
    PHONE,
    ADDRESS,
    CITY,
    ZIP_CODE,
    OCCUPATION,
    EMPLOYER,
    PURPOSE_OF_VISIT,
    TRAVEL_DATES,
    ACCOMMODATION,
    EMERGENCY_CONTACT,
    MONTHLY_INCOME,
    BANK_NAME,
];

// Squashed (lowercase, alphanumeric-only) label -> field id
const ALIASES: &[(&str, &str)] = &[
    ("name", FULL_NAME),
    ("applicantname", FULL_NAME),
    ("surnameandgivennames", FULL_NAME),
    ("dob", DATE_OF_BIRTH),
    ("birthdate", DATE_OF_BIRTH),
    ("born", DATE_OF_BIRTH),
    ("passport", PASSPORT_NUMBER),
    ("passportno", PASSPORT_NUMBER),
    ("documentnumber", PASSPORT_NUMBER),
    ("citizenship", NATIONALITY),
    ("emailaddress", EMAIL),
    ("mail", EMAIL),
    ("telephone", PHONE),
    ("phonenumber", PHONE),
    ("mobile", PHONE),
    ("homeaddress", ADDRESS),
    ("street", ADDRESS),
    ("town", CITY),
    ("zip", ZIP_CODE),
    ("postcode", ZIP_CODE),
    ("postalcode", ZIP_CODE),
    ("jobtitle", OCCUPATION),
    ("profession", OCCUPATION),
    ("company", EMPLOYER),
    ("purpose", PURPOSE_OF_VISIT),
    ("reasonfortravel", PURPOSE_OF_VISIT),
    ("dates", TRAVEL_DATES),
    ("traveldate", TRAVEL_DATES),
    ("hotel", ACCOMMODATION),
    ("lodging", ACCOMMODATION),
    ("emergency", EMERGENCY_CONTACT),
    ("income", MONTHLY_INCOME),
    ("salary", MONTHLY_INCOME),
    ("bank", BANK_NAME),
];

/// How a free-form label was mapped onto the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatch {
    /// The label is the field id, modulo case and separators
    Exact(&'static str),
    /// The label is a known synonym
    Alias(&'static str),
}

impl LabelMatch {
    pub fn field_id(self) -> &'static str {
        match self {
            Self::Exact(id) | Self::Alias(id) => id,
        }
    }
}

pub fn is_known(field_id: &str) -> bool {
    FIELD_IDS.contains(&field_id)
}

fn squash(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Map a document label such as "Passport No." or "date_of_birth" onto a field id
pub fn normalize_label(label: &str) -> Option<LabelMatch> {
    let key = squash(label);
    if key.is_empty() {
        return None;
    }
    if let Some(id) = FIELD_IDS.iter().find(|id| squash(id) == key) {
        return Some(LabelMatch::Exact(*id));
    }
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, id)| LabelMatch::Alias(*id))
}
