use core_pool::GraphemeId;

const TAG_PLAIN: u32 = 0b00 << 30;
const TAG_START: u32 = 0b01 << 30;
const TAG_CONT: u32 = 0b10 << 30;
const TAG_MASK: u32 = 0b11 << 30;
const PAYLOAD_MASK: u32 = !TAG_MASK;

/// A cell's payload, packed into one `u32`: the top 2 bits tag which of the
/// three shapes it is, the low 30 bits carry either a raw codepoint or a
/// [`GraphemeId`] (spec's "encoded character cell": plain codepoint vs.
/// `GRAPHEME_START|gid` vs. `CONTINUATION|gid`).
///
/// `GraphemeId` was sized to exactly 30 bits (see `core-pool`) so it slots
/// into the payload with no truncation or second lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedChar {
    Plain(char),
    GraphemeStart(GraphemeId),
    Continuation(GraphemeId),
}

impl EncodedChar {
    pub fn plain(c: char) -> Self {
        EncodedChar::Plain(c)
    }

    pub fn grapheme_start(id: GraphemeId) -> Self {
        EncodedChar::GraphemeStart(id)
    }

    pub fn continuation(id: GraphemeId) -> Self {
        EncodedChar::Continuation(id)
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            EncodedChar::Plain(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_grapheme_id(&self) -> Option<GraphemeId> {
        match self {
            EncodedChar::GraphemeStart(id) | EncodedChar::Continuation(id) => Some(*id),
            EncodedChar::Plain(_) => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            EncodedChar::Plain(c) => TAG_PLAIN | (c as u32 & PAYLOAD_MASK),
            EncodedChar::GraphemeStart(id) => TAG_START | (id.as_u32() & PAYLOAD_MASK),
            EncodedChar::Continuation(id) => TAG_CONT | (id.as_u32() & PAYLOAD_MASK),
        }
    }

    pub fn from_u32(raw: u32) -> Self {
        let payload = raw & PAYLOAD_MASK;
        match raw & TAG_MASK {
            TAG_PLAIN => char::from_u32(payload)
                .map(EncodedChar::Plain)
                .unwrap_or(EncodedChar::Plain('\u{FFFD}')),
            TAG_START => EncodedChar::GraphemeStart(GraphemeId::from_u32(payload)),
            _ => EncodedChar::Continuation(GraphemeId::from_u32(payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_round_trips_through_u32() {
        let enc = EncodedChar::plain('界');
        let raw = enc.to_u32();
        assert_eq!(EncodedChar::from_u32(raw), enc);
    }

    #[test]
    fn grapheme_start_round_trips_through_u32() {
        let id = GraphemeId::from_u32(0x3FFFF);
        let enc = EncodedChar::grapheme_start(id);
        let raw = enc.to_u32();
        match EncodedChar::from_u32(raw) {
            EncodedChar::GraphemeStart(got) => assert_eq!(got, id),
            other => panic!("expected GraphemeStart, got {other:?}"),
        }
    }

    #[test]
    fn continuation_is_distinguishable_from_start() {
        let id = GraphemeId::from_u32(5);
        let start = EncodedChar::grapheme_start(id).to_u32();
        let cont = EncodedChar::continuation(id).to_u32();
        assert_ne!(start, cont);
        assert_eq!(start & !TAG_MASK, cont & !TAG_MASK);
    }
}
