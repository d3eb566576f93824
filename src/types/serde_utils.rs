//! serde adapters for the snapshot contract

/// `Rational` as its `"n/d"` display string.
pub mod rational_string {
    use std::str::FromStr;

    use malachite_q::Rational;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Rational, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rational, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rational::from_str(&raw).map_err(|_| D::Error::custom(format!("invalid rational {raw:?}")))
    }
}

/// `[Rational; 2]` as two `"n/d"` strings.
pub mod rational_pair {
    use std::str::FromStr;

    use malachite_q::Rational;
    use serde::{Deserialize, Deserializer, Serializer, de::Error, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(
        value: &[Rational; 2],
        serializer: S
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        for v in value {
            seq.serialize_element(&v.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<[Rational; 2], D::Error> {
        let [a, b] = <[String; 2]>::deserialize(deserializer)?;
        let parse = |raw: String| {
            Rational::from_str(&raw)
                .map_err(|_| D::Error::custom(format!("invalid rational {raw:?}")))
        };
        Ok([parse(a)?, parse(b)?])
    }
}

/// finite floats as numbers, infinities as `"Infinity"` / `"-Infinity"`
pub mod extended_f64 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => match s.as_str() {
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid number {other:?}")))
            }
        }
    }
}
