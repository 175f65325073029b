//! Explicit Congestion Notification codepoints and their merge rules.

/// ECN codepoint carried in the low two bits of the traffic class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ecn {
    /// Not ECN-capable transport.
    NotEct,
    /// ECN-capable transport, codepoint 1.
    Ect1,
    /// ECN-capable transport, codepoint 0.
    Ect0,
    /// Congestion experienced.
    Ce,
}

impl Ecn {
    /// Extract the codepoint from a traffic class octet.
    #[must_use]
    pub const fn from_traffic_class(traffic_class: u8) -> Self {
        match traffic_class & 0b11 {
            0b00 => Self::NotEct,
            0b01 => Self::Ect1,
            0b10 => Self::Ect0,
            _ => Self::Ce,
        }
    }

    /// Combine the codepoint of a queue with that of an arriving fragment
    /// following RFC 3168 §5.3.
    ///
    /// Returns `None` when the combination is invalid and the fragment must be
    /// dropped: CE arriving at a Not-ECT datagram, or Not-ECT arriving at an
    /// ECN-capable one. CE dominates every ECN-capable codepoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use frag6::fragment::Ecn;
    ///
    /// assert_eq!(Ecn::Ect0.merge(Ecn::Ce), Some(Ecn::Ce));
    /// assert_eq!(Ecn::Ce.merge(Ecn::Ect1), Some(Ecn::Ce));
    /// assert_eq!(Ecn::NotEct.merge(Ecn::Ce), None);
    /// assert_eq!(Ecn::Ect1.merge(Ecn::NotEct), None);
    /// ```
    #[must_use]
    pub fn merge(self, arriving: Self) -> Option<Self> {
        match (self, arriving) {
            (Self::NotEct, Self::Ce) => None,
            (_, Self::Ce) => Some(Self::Ce),
            (queued, Self::NotEct) if queued != Self::NotEct => None,
            (queued, _) => Some(queued),
        }
    }
}
