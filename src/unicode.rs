//! Unicode property lookup for \p{...} escapes

use icu_properties::{maps, sets, GeneralCategory, GeneralCategoryGroup, Script};

/// Binary properties accepted by name. This is the subset PCRE patterns
/// reach for; general categories and scripts cover the rest.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum BinaryProperty {
    Alphabetic,
    Ascii,
    Any,
    Assigned,
    Cased,
    Dash,
    HexDigit,
    IdContinue,
    IdStart,
    Ideographic,
    Lowercase,
    Math,
    Uppercase,
    WhiteSpace,
    XidContinue,
    XidStart,
}

impl BinaryProperty {
    fn from_name(s: &str) -> Option<BinaryProperty> {
        use BinaryProperty::*;
        match s {
            "Alpha" | "Alphabetic" => Some(Alphabetic),
            "ASCII" => Some(Ascii),
            "Any" => Some(Any),
            "Assigned" => Some(Assigned),
            "Cased" => Some(Cased),
            "Dash" => Some(Dash),
            "Hex" | "Hex_Digit" => Some(HexDigit),
            "IDC" | "ID_Continue" => Some(IdContinue),
            "IDS" | "ID_Start" => Some(IdStart),
            "Ideo" | "Ideographic" => Some(Ideographic),
            "Lower" | "Lowercase" => Some(Lowercase),
            "Math" => Some(Math),
            "Upper" | "Uppercase" => Some(Uppercase),
            "space" | "White_Space" => Some(WhiteSpace),
            "XIDC" | "XID_Continue" => Some(XidContinue),
            "XIDS" | "XID_Start" => Some(XidStart),
            _ => None,
        }
    }

    fn contains(self, c: char) -> bool {
        use BinaryProperty::*;
        match self {
            Alphabetic => sets::alphabetic().contains(c),
            Ascii => c.is_ascii(),
            Any => true,
            Assigned => maps::general_category().get(c) != GeneralCategory::Unassigned,
            Cased => sets::cased().contains(c),
            Dash => sets::dash().contains(c),
            HexDigit => sets::hex_digit().contains(c),
            IdContinue => sets::id_continue().contains(c),
            IdStart => sets::id_start().contains(c),
            Ideographic => sets::ideographic().contains(c),
            Lowercase => sets::lowercase().contains(c),
            Math => sets::math().contains(c),
            Uppercase => sets::uppercase().contains(c),
            WhiteSpace => sets::white_space().contains(c),
            XidContinue => sets::xid_continue().contains(c),
            XidStart => sets::xid_start().contains(c),
        }
    }
}

/// A resolved \p{...} name: a general category group (including the
/// one-letter supergroups like `L`), a script, or a binary property.
#[derive(Debug, Copy, Clone)]
pub(crate) enum PropertyClass {
    Category(GeneralCategoryGroup),
    Script(Script),
    Binary(BinaryProperty),
}

impl PropertyClass {
    /// Resolve a property name. Binary names and categories win over
    /// scripts so that e.g. `Lu` is never mistaken for a script alias.
    pub(crate) fn resolve(name: &str) -> Option<PropertyClass> {
        if let Some(b) = BinaryProperty::from_name(name) {
            return Some(PropertyClass::Binary(b));
        }
        if let Some(group) = GeneralCategoryGroup::name_to_enum_mapper().get_strict(name) {
            return Some(PropertyClass::Category(group));
        }
        Script::name_to_enum_mapper()
            .get_strict(name)
            .map(PropertyClass::Script)
    }

    pub(crate) fn contains(self, cp: u32) -> bool {
        let Some(c) = char::from_u32(cp) else {
            return false;
        };
        match self {
            PropertyClass::Category(group) => group.contains(maps::general_category().get(c)),
            PropertyClass::Script(script) => maps::script().get(c) == script,
            PropertyClass::Binary(b) => b.contains(c),
        }
    }
}

/// Sorted, disjoint ranges of code points whose lowercase mapping differs
/// from the code point itself. The class builder's case closure walks
/// these instead of enumerating whole class intervals.
pub(crate) fn lowercase_change_ranges() -> impl Iterator<Item = (u32, u32)> {
    sets::changes_when_lowercased()
        .iter_ranges()
        .map(|r| (*r.start(), *r.end()))
}

/// \return whether \p name is a known property name.
pub(crate) fn is_valid_property(name: &str) -> bool {
    PropertyClass::resolve(name).is_some()
}

/// \return whether the code point \p cp has the named property. Unknown
/// names contain nothing; the parser has already validated them.
pub(crate) fn property_contains(name: &str, cp: u32) -> bool {
    match PropertyClass::resolve(name) {
        Some(pc) => pc.contains(cp),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_categories_scripts_and_binaries() {
        assert!(is_valid_property("L"));
        assert!(is_valid_property("Lu"));
        assert!(is_valid_property("Greek"));
        assert!(is_valid_property("Alphabetic"));
        assert!(!is_valid_property("Bogus_Property"));
    }

    #[test]
    fn membership() {
        assert!(property_contains("L", 'a' as u32));
        assert!(!property_contains("L", '1' as u32));
        assert!(property_contains("Nd", '7' as u32));
        assert!(property_contains("Greek", 0x03B1));
        assert!(!property_contains("Greek", 'a' as u32));
        // Lone surrogates have no properties.
        assert!(!property_contains("Any", 0xD800));
    }
}
