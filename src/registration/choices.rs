//! Enumerated answers accepted by the registration form.
//!
//! Each choice type parses from, and displays as, the exact text the user is
//! shown. Matching is case-sensitive and happens after trimming.

use serde::{Deserialize, Serialize};

/// Generates a closed set of display-valued choices.
///
/// Emits `ALL` (declaration order), `as_str`, `Display`, `FromStr` and
/// string-valued serde impls so stored and wire values are the display text.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every member, in the order it is offered to the user.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Display value, which is also the only accepted input.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("'{}' is not a valid {}", s, $label)),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

choice_enum! {
    Gender, "gender" {
        Male => "Male",
        Female => "Female",
        Transgender => "Transgender",
    }
}

choice_enum! {
    /// Answer to the disability (divyang) question.
    YesNo, "yes/no answer" {
        Yes => "Yes",
        No => "No",
    }
}

choice_enum! {
    /// How the named parent or guardian is related to the registrant.
    ParentRelation, "parent relation" {
        Father => "Father",
        Mother => "Mother",
        Spouse => "Spouse",
    }
}

choice_enum! {
    Religion, "religion" {
        Hindu => "Hindu",
        Muslim => "Muslim",
        Christian => "Christian",
        Sikh => "Sikh",
        Buddhist => "Buddhist",
        Jain => "Jain",
        Others => "Others",
    }
}

choice_enum! {
    /// Reservation category.
    Category, "category" {
        General => "General",
        Obc => "OBC",
        Sc => "SC",
        St => "ST",
    }
}

choice_enum! {
    /// Selects which trade list the final question offers.
    QualificationType, "qualification type" {
        Educational => "Educational Qualification",
        Scheme => "Trained Under Schemes",
    }
}

choice_enum! {
    /// Highest educational qualification, asked when the qualification type
    /// is [`QualificationType::Educational`].
    EducationTrade, "educational qualification" {
        Fifth => "5th",
        Sixth => "6th",
        Seventh => "7th",
        Eighth => "8th",
        Ninth => "9th",
        Tenth => "10th",
        Eleventh => "11th",
        Twelfth => "12th",
        Iti => "ITI",
        Msbsvet => "MSBSVET",
        ItiDual => "ITI Dual",
        ItiResultAwaited => "ITI Result Awaited",
        DiplomaPursuing => "Diploma Pursuing",
        GraduatePursuing => "Graduate Pursuing",
        AdvancedDiploma => "Advanced Diploma",
        Graduate => "Graduate",
        PostGraduate => "Post Graduate",
        Doctoral => "Doctoral",
        Others => "Others",
    }
}

choice_enum! {
    /// Training scheme, asked when the qualification type is
    /// [`QualificationType::Scheme`].
    SchemeTrade, "training scheme" {
        Nulm => "NULM",
        Ddugky => "DDUGKY",
        StateSpecific => "State Specific Schemes",
        Pmkvy => "PMKVY",
        SdiMes => "SDI-MES",
        Central => "Central Schemes",
        VseMhrd => "Vocationalization of School Education (VSE)-MHRD",
        PmkvyMsde => "PMKVY-MSDE",
        DdugkyMord => "DDUGKY-MoRD",
        EstpNulm => "EST&P-NULM",
        PmaygMosje => "PMAYG-MoSJE",
        CpwdMoud => "CPWD-MoUD",
        NskfdcMosje => "NSKFDC-MoSJE",
        NbcfdcMosje => "NBCFDC-MoSJE",
        NsdfdcMosje => "NSDFDC-MoSJE",
        IsdsTextiles => "ISDS-MoTextiles",
        SeekhoAurKamao => "Seekho aur Kamao-MoMA",
        SscFeeBased => "SSC-fee based cources",
    }
}

/// Render the members of a choice set as `A/B/C`, the inline form used in
/// short prompts.
pub fn inline_list<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Render the members of a choice set as a bulleted list, one per line.
pub fn bullet_list<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| format!("- {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_display_values() {
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("OBC".parse::<Category>().unwrap(), Category::Obc);
        assert_eq!(
            "Educational Qualification".parse::<QualificationType>().unwrap(),
            QualificationType::Educational
        );
        assert_eq!(
            "EST&P-NULM".parse::<SchemeTrade>().unwrap(),
            SchemeTrade::EstpNulm
        );
        assert_eq!(
            "ITI Result Awaited".parse::<EducationTrade>().unwrap(),
            EducationTrade::ItiResultAwaited
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!("male".parse::<Gender>().is_err());
        assert!("yes".parse::<YesNo>().is_err());
        assert!("obc".parse::<Category>().is_err());
    }

    #[test]
    fn unknown_value_error_names_the_choice_set() {
        let err = "Cousin".parse::<ParentRelation>().unwrap_err();
        assert_eq!(err, "'Cousin' is not a valid parent relation");
    }

    #[test]
    fn display_matches_parse_for_every_member() {
        for trade in EducationTrade::ALL {
            assert_eq!(trade.to_string().parse::<EducationTrade>().unwrap(), *trade);
        }
        for trade in SchemeTrade::ALL {
            assert_eq!(trade.to_string().parse::<SchemeTrade>().unwrap(), *trade);
        }
        for religion in Religion::ALL {
            assert_eq!(religion.as_str().parse::<Religion>().unwrap(), *religion);
        }
    }

    #[test]
    fn member_counts() {
        assert_eq!(Gender::ALL.len(), 3);
        assert_eq!(YesNo::ALL.len(), 2);
        assert_eq!(ParentRelation::ALL.len(), 3);
        assert_eq!(Religion::ALL.len(), 7);
        assert_eq!(Category::ALL.len(), 4);
        assert_eq!(QualificationType::ALL.len(), 2);
        assert_eq!(EducationTrade::ALL.len(), 19);
        assert_eq!(SchemeTrade::ALL.len(), 18);
    }

    #[test]
    fn serde_uses_display_value() {
        let json = serde_json::to_string(&QualificationType::Scheme).unwrap();
        assert_eq!(json, "\"Trained Under Schemes\"");
        let parsed: SchemeTrade = serde_json::from_str("\"PMKVY-MSDE\"").unwrap();
        assert_eq!(parsed, SchemeTrade::PmkvyMsde);
        assert!(serde_json::from_str::<Gender>("\"Unknown\"").is_err());
    }

    #[test]
    fn list_rendering() {
        assert_eq!(inline_list(Gender::ALL), "Male/Female/Transgender");
        assert_eq!(bullet_list(YesNo::ALL), "- Yes\n- No");
    }
}
