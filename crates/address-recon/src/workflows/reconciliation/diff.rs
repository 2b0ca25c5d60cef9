use super::domain::{zip5, AddressField, ChangeStatus, OriginalAddress, ResolvedAddress};
use super::normalizer::comparable;

/// Compares an original address with a resolution and reports the changed fields,
/// labelled with the strategy that produced the resolution.
///
/// Street lines are only compared when the resolution carries them, so a zip lookup
/// never reports an address change. Zips compare on their first five characters.
pub fn diff(original: &OriginalAddress, resolved: &ResolvedAddress) -> ChangeStatus {
    let changed = AddressField::ordered()
        .into_iter()
        .filter(|field| field_changed(*field, original, resolved))
        .collect();

    ChangeStatus::changes(resolved.strategy, changed)
}

fn field_changed(
    field: AddressField,
    original: &OriginalAddress,
    resolved: &ResolvedAddress,
) -> bool {
    match field {
        AddressField::Address1 => {
            street_changed(Some(original.address1()), resolved.address1.as_deref())
        }
        AddressField::Address2 => {
            street_changed(original.address2(), resolved.address2.as_deref())
        }
        AddressField::City => comparable(original.city()) != comparable(&resolved.city),
        AddressField::State => comparable(original.state()) != comparable(&resolved.state),
        AddressField::Zip => zip5(original.zip().trim()) != zip5(resolved.zip.trim()),
    }
}

fn street_changed(original: Option<&str>, resolved: Option<&str>) -> bool {
    match resolved.map(str::trim).filter(|value| !value.is_empty()) {
        Some(resolved) => comparable(original.unwrap_or_default()) != comparable(resolved),
        None => false,
    }
}
