use std::collections::HashMap;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::workflows::reconciliation::{
    AddressQuery, StreetCandidate, VerificationError, ZipCandidate,
};

pub(crate) fn city_state_request(user_id: &str, zip5: &str) -> String {
    format!(
        "<CityStateLookupRequest USERID=\"{}\"><ZipCode ID=\"0\"><Zip5>{}</Zip5></ZipCode></CityStateLookupRequest>",
        escape(user_id),
        escape(zip5),
    )
}

/// USPS swaps the street lines: `Address1` is the unit or suite, `Address2` the street.
pub(crate) fn address_validate_request(user_id: &str, query: &AddressQuery) -> String {
    let (zip5, zip4) = split_zip(&query.zip);
    format!(
        "<AddressValidateRequest USERID=\"{}\"><Revision>1</Revision><Address ID=\"0\">\
         <Address1>{}</Address1><Address2>{}</Address2><City>{}</City><State>{}</State>\
         <Zip5>{}</Zip5><Zip4>{}</Zip4></Address></AddressValidateRequest>",
        escape(user_id),
        escape(query.street2.as_str()),
        escape(query.street1.as_str()),
        escape(query.city.as_str()),
        escape(query.state.as_str()),
        zip5,
        zip4,
    )
}

/// Splits a US zip into its five digit and plus-four parts, ignoring punctuation.
pub(crate) fn split_zip(zip: &str) -> (String, String) {
    let digits: String = zip.chars().filter(char::is_ascii_digit).collect();
    let zip5: String = digits.chars().take(5).collect();
    let zip4: String = digits.chars().skip(5).take(4).collect();
    (zip5, zip4)
}

pub(crate) fn parse_city_state(body: &str) -> Result<ZipCandidate, VerificationError> {
    let fields = parse_fields(body)?;
    Ok(ZipCandidate {
        city: fields.require("City")?,
        state: fields.require("State")?,
        zip: fields.require("Zip5")?,
    })
}

pub(crate) fn parse_address_validate(body: &str) -> Result<StreetCandidate, VerificationError> {
    let fields = parse_fields(body)?;
    let zip5 = fields.require("Zip5")?;
    let zip = match fields.optional("Zip4") {
        Some(zip4) => format!("{zip5}-{zip4}"),
        None => zip5,
    };

    Ok(StreetCandidate {
        street1: fields.require("Address2")?,
        street2: fields.optional("Address1").unwrap_or_default(),
        city: fields.require("City")?,
        state: fields.require("State")?,
        zip,
    })
}

/// Leaf element text of the first address in a response.
struct ResponseFields {
    values: HashMap<String, String>,
}

impl ResponseFields {
    fn require(&self, name: &str) -> Result<String, VerificationError> {
        self.optional(name)
            .ok_or_else(|| VerificationError::Response(format!("response is missing <{name}>")))
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Collects leaf values and fails with the service's own description when the body
/// carries an `<Error>` element, whether at the root or inside the address.
fn parse_fields(body: &str) -> Result<ResponseFields, VerificationError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut values = HashMap::new();
    let mut error_description: Option<String> = None;
    let mut saw_error = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                if name == "Error" {
                    saw_error = true;
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|err| VerificationError::Response(err.to_string()))?
                    .into_owned();
                let in_error = path.iter().any(|segment| segment == "Error");
                match path.last() {
                    Some(leaf) if in_error && leaf == "Description" => {
                        error_description.get_or_insert(value);
                    }
                    Some(leaf) if !in_error => {
                        values.entry(leaf.clone()).or_insert(value);
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(VerificationError::Response(format!(
                    "malformed XML at byte {}: {err}",
                    reader.buffer_position()
                )))
            }
        }
    }

    if saw_error {
        let description = error_description
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| "verification service returned an error".to_string());
        return Err(VerificationError::Service(description));
    }

    Ok(ResponseFields { values })
}
