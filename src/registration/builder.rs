use time::Date;

use super::dto::{FormValues, OccupantFields};
use super::model::{now_timestamp, GuestRecord, Nationality, Occupant, Purpose};
use super::validators::{
    canonical_date, parse_date, validate_document, validate_email, validate_phone, DocumentPolicy,
    FieldRules,
};

/// Turns raw form values into a [`GuestRecord`], or every problem found in them.
///
/// Errors are reported in form order: stay dates, guest 1, guest 2 (only when
/// two guests are declared), contact fields, date ordering, consent.
pub fn build_record(values: &FormValues, rules: FieldRules) -> Result<GuestRecord, Vec<String>> {
    let values = normalize(values);
    let mut errors = Vec::new();

    let guests = values.guests;
    if !(1..=2).contains(&guests) {
        errors.push("Number of guests must be 1 or 2.".to_string());
    }

    let arrival = check_date("Arrival date", &values.arrival, &mut errors);
    let departure = check_date("Departure date", &values.departure, &mut errors);

    let primary = check_occupant(1, &values.primary, rules, &mut errors);
    let companion = if guests == 2 {
        check_occupant(2, &values.companion, rules, &mut errors).map(Some)
    } else {
        Some(None)
    };

    if values.phone.is_empty() {
        errors.push("Phone is required.".to_string());
    } else if !validate_phone(&values.phone, rules.phone) {
        errors.push(format!("Phone number \"{}\" is not valid.", values.phone));
    }

    if values.email.is_empty() {
        errors.push("Email is required.".to_string());
    } else if !validate_email(&values.email) {
        errors.push(format!("Email \"{}\" is not valid.", values.email));
    }

    if let (Some(a), Some(d)) = (arrival, departure) {
        if d <= a {
            errors.push("Departure must be after arrival.".to_string());
        }
    }

    if !values.consent {
        errors.push("Consent to the processing of personal data is required.".to_string());
    }

    // every `None` above has pushed an error, so the fallback arm is never empty
    match (arrival, departure, primary, companion) {
        (Some(arrival), Some(departure), Some(primary), Some(companion)) if errors.is_empty() => {
            Ok(GuestRecord {
                arrival,
                departure,
                primary,
                companion,
                phone: values.phone,
                email: values.email,
                submitted_at: now_timestamp(),
            })
        }
        _ => Err(errors),
    }
}

/// Trims every field and rewrites date text into `D. M. YYYY`.
pub fn normalize(values: &FormValues) -> FormValues {
    let occupant = |f: &OccupantFields| {
        let mut f = f.trimmed();
        f.birth_date = canonical_date(&f.birth_date);
        f
    };
    FormValues {
        arrival: canonical_date(&values.arrival),
        departure: canonical_date(&values.departure),
        guests: values.guests,
        primary: occupant(&values.primary),
        companion: occupant(&values.companion),
        phone: values.phone.trim().to_string(),
        email: values.email.trim().to_string(),
        consent: values.consent,
    }
}

fn check_date(label: &str, text: &str, errors: &mut Vec<String>) -> Option<Date> {
    if text.is_empty() {
        errors.push(format!("{label} is required."));
        return None;
    }
    let date = parse_date(text);
    if date.is_none() {
        errors.push(format!("{label} \"{text}\" is not a valid date (D. M. YYYY)."));
    }
    date
}

fn check_occupant(
    index: u8,
    f: &OccupantFields,
    rules: FieldRules,
    errors: &mut Vec<String>,
) -> Option<Occupant> {
    let before = errors.len();
    let mut required = |value: &str, what: &str| {
        if value.is_empty() {
            errors.push(format!("Guest {index}: {what} is required."));
            false
        } else {
            true
        }
    };

    required(&f.name, "name");
    let has_birth = required(&f.birth_date, "birth date");
    let has_nationality = required(&f.nationality, "nationality");
    let has_purpose = required(&f.purpose, "purpose of stay");
    required(&f.address, "address");
    let has_document = required(&f.document, "document number");

    let birth_date = if has_birth {
        let parsed = parse_date(&f.birth_date);
        if parsed.is_none() {
            errors.push(format!(
                "Guest {index}: birth date \"{}\" is not a valid date (D. M. YYYY).",
                f.birth_date
            ));
        }
        parsed
    } else {
        None
    };

    let nationality = if has_nationality {
        let parsed = Nationality::from_label(&f.nationality);
        if parsed.is_none() {
            errors.push(format!("Guest {index}: unknown nationality \"{}\".", f.nationality));
        }
        parsed
    } else {
        None
    };

    let purpose = if has_purpose {
        let parsed = Purpose::from_label(&f.purpose);
        if parsed.is_none() {
            errors.push(format!("Guest {index}: unknown purpose of stay \"{}\".", f.purpose));
        }
        parsed
    } else {
        None
    };

    if has_document && !validate_document(&f.document, rules.document) {
        match rules.document {
            DocumentPolicy::NineDigits => errors.push(format!(
                "Guest {index}: document number must be exactly 9 digits."
            )),
            DocumentPolicy::FreeText => errors.push(format!(
                "Guest {index}: document number \"{}\" is not valid.",
                f.document
            )),
        }
    }

    if errors.len() != before {
        return None;
    }
    Some(Occupant {
        name: f.name.clone(),
        birth_date: birth_date?,
        nationality: nationality?,
        purpose: purpose?,
        address: f.address.clone(),
        document: f.document.clone(),
    })
}
