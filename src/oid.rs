//! Object identifiers.
//!
//! [`Oid`] keeps its arcs inline for the common case (up to 16 arcs) and
//! orders lexicographically by arc, which is the order agents walk in.

use std::fmt;

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Maximum number of arcs accepted from text or from the wire.
pub const MAX_OID_LEN: usize = 128;

/// An immutable SNMP object identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse dotted-decimal text such as `"1.3.6.1.2.1.1.1.0"`.
    ///
    /// A single leading dot is accepted (`".1.3.6.1"`). Empty input, empty
    /// arcs, non-numeric arcs and arcs outside the X.690 first/second arc
    /// ranges are rejected.
    ///
    /// ```
    /// use snmp_poller::Oid;
    ///
    /// let oid = Oid::parse(".1.3.6.1.2.1.1.3.0").unwrap();
    /// assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.3.0");
    /// assert!(Oid::parse("1.3..6").is_err());
    /// assert!(Oid::parse("sysDescr").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        let body = text.strip_prefix('.').unwrap_or(text);
        if body.is_empty() {
            return Err(Error::InvalidOid(format!("'{s}' is empty").into()).boxed());
        }

        let mut arcs = SmallVec::new();
        for part in body.split('.') {
            let bad_arc = || Error::InvalidOid(format!("'{s}' has a bad arc '{part}'").into());
            // u32::from_str would also take a leading '+'
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad_arc().boxed());
            }
            let arc: u32 = part.parse().map_err(|_| bad_arc())?;
            arcs.push(arc);
        }

        let oid = Self { arcs };
        oid.validate()?;
        Ok(oid)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// True when `self` lies strictly below `root` in the tree.
    pub fn is_descendant_of(&self, root: &Oid) -> bool {
        self.arcs.len() > root.arcs.len() && self.starts_with(root)
    }

    /// Arcs following `prefix`, if `self` starts with it.
    pub fn suffix_after(&self, prefix: &Oid) -> Option<&[u32]> {
        self.starts_with(prefix).then(|| &self.arcs[prefix.arcs.len()..])
    }

    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Check first/second arc ranges and overall length.
    pub fn validate(&self) -> Result<()> {
        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::InvalidOid(
                format!("{} arcs exceed the limit of {MAX_OID_LEN}", self.arcs.len()).into(),
            )
            .boxed());
        }
        let Some(&first) = self.arcs.first() else {
            return Ok(());
        };
        if first > 2 {
            return Err(Error::InvalidOid(format!("first arc {first} is above 2").into()).boxed());
        }
        if let Some(&second) = self.arcs.get(1)
            && first < 2
            && second >= 40
        {
            return Err(Error::InvalidOid(
                format!("second arc {second} is above 39 under arc {first}").into(),
            )
            .boxed());
        }
        // 2.x encodes as 80 + x, which must still fit one 32-bit sub-identifier
        if let Some(&second) = self.arcs.get(1)
            && first == 2
            && second > u32::MAX - 80
        {
            return Err(Error::InvalidOid(
                format!("second arc {second} under arc 2 does not fit a sub-identifier").into(),
            )
            .boxed());
        }
        Ok(())
    }

    /// BER content octets (no tag or length).
    ///
    /// The first sub-identifier is computed in 64 bits, so unvalidated arcs
    /// still encode without overflow.
    pub fn to_ber(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();
        match self.arcs.as_slice() {
            [] => {}
            [first] => push_subidentifier(&mut bytes, u64::from(*first) * 40),
            [first, second, rest @ ..] => {
                push_subidentifier(&mut bytes, u64::from(*first) * 40 + u64::from(*second));
                for &arc in rest {
                    push_subidentifier(&mut bytes, u64::from(arc));
                }
            }
        }
        bytes
    }

    /// Decode BER content octets.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        let mut arcs: SmallVec<[u32; 16]> = SmallVec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let (value, consumed) = read_subidentifier(rest)?;
            rest = &rest[consumed..];
            if arcs.is_empty() {
                let first = (value / 40).min(2);
                arcs.push(first);
                arcs.push(value - first * 40);
            } else {
                arcs.push(value);
            }
            if arcs.len() > MAX_OID_LEN {
                return Err(Error::InvalidOid("encoded OID is too long".into()).boxed());
            }
        }
        Ok(Self { arcs })
    }
}

fn push_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u64) {
    let groups = (64 - value.leading_zeros()).div_ceil(7).max(1);
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

fn read_subidentifier(data: &[u8]) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return Err(Error::InvalidOid("sub-identifier overflows 32 bits".into()).boxed());
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Error::InvalidOid("truncated sub-identifier".into()).boxed())
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.arcs.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Build an [`Oid`] from literal arcs.
///
/// ```
/// use snmp_poller::oid;
///
/// assert_eq!(oid!(1, 3, 6, 1).to_string(), "1.3.6.1");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}
