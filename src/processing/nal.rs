use std::borrow::Cow;

// NAL unit type constants
pub const NAL_TYPE_SLICE: u8 = 1;
pub const NAL_TYPE_IDR: u8 = 5;
pub const NAL_TYPE_SEI: u8 = 6;
pub const NAL_TYPE_SPS: u8 = 7;
pub const NAL_TYPE_PPS: u8 = 8;
pub const NAL_TYPE_AUD: u8 = 9;

/// One NAL unit borrowed from the access unit it was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// NAL unit type (lower 5 bits of first byte)
    pub nal_type: u8,
    data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// Raw unit bytes including the header byte, emulation prevention intact
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_keyframe(&self) -> bool {
        self.nal_type == NAL_TYPE_IDR
    }

    /// Payload with `00 00 03` emulation prevention bytes removed.
    ///
    /// Borrows when nothing had to be removed.
    pub fn rbsp(&self) -> Cow<'a, [u8]> {
        let data = self.data;
        let first = data
            .windows(3)
            .position(|w| w == [0x00, 0x00, 0x03]);
        let Some(first) = first else {
            return Cow::Borrowed(data);
        };

        let mut out = Vec::with_capacity(data.len());
        out.extend_from_slice(&data[..first + 2]);
        let mut zeros = 0;
        for &byte in &data[first + 3..] {
            if zeros >= 2 && byte == 0x03 {
                zeros = 0;
                continue;
            }
            zeros = if byte == 0 { zeros + 1 } else { 0 };
            out.push(byte);
        }
        Cow::Owned(out)
    }
}

/// Split an Annex B access unit into NAL units.
///
/// Units are located by their `00 00 01` start codes. A unit's data starts at
/// its header byte and ends before the next start code, with the zero bytes
/// that belong to a following 4 byte start code trimmed off.
pub fn find_nal_units(data: &[u8]) -> Vec<NalUnit<'_>> {
    let mut nals = Vec::new();
    let Some(mut start) = next_start_code(data, 0) else {
        return nals;
    };

    loop {
        let nal_start = start + 3;
        let next = next_start_code(data, nal_start);
        let mut nal_end = next.unwrap_or(data.len());

        // The leading zero of a 4 byte start code belongs to the next unit
        while nal_end > nal_start && data[nal_end - 1] == 0 {
            nal_end -= 1;
        }

        if nal_end > nal_start {
            nals.push(NalUnit {
                nal_type: data[nal_start] & 0x1F,
                data: &data[nal_start..nal_end],
            });
        }

        match next {
            Some(position) => start = position,
            None => break,
        }
    }

    nals
}

fn next_start_code(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(3)
        .position(|w| w == [0x00, 0x00, 0x01])
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_start_codes() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1F, // SPS
            0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80, // PPS
            0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, // IDR
        ];
        let nals = find_nal_units(&data);
        assert_eq!(nals.len(), 3);
        assert_eq!(nals[0].nal_type, NAL_TYPE_SPS);
        assert_eq!(nals[0].data(), &[0x67, 0x42, 0x00, 0x1F]);
        assert_eq!(nals[1].nal_type, NAL_TYPE_PPS);
        assert_eq!(nals[1].data(), &[0x68, 0xCE, 0x3C, 0x80]);
        assert!(nals[2].is_keyframe());
        assert_eq!(nals[2].len(), 3);
    }

    #[test]
    fn test_leading_garbage_and_empty_input() {
        assert!(find_nal_units(&[]).is_empty());
        assert!(find_nal_units(&[0x00, 0x00, 0x00]).is_empty());

        let nals = find_nal_units(&[0xAA, 0x00, 0x00, 0x01, 0x41, 0x9A]);
        assert_eq!(nals.len(), 1);
        assert_eq!(nals[0].nal_type, NAL_TYPE_SLICE);
    }

    #[test]
    fn test_rbsp_removes_emulation_prevention() {
        let data = [0x00, 0x00, 0x01, 0x06, 0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x00, 0x80];
        let nals = find_nal_units(&data);
        assert_eq!(nals.len(), 1);
        assert_eq!(nals[0].nal_type, NAL_TYPE_SEI);
        assert_eq!(nals[0].rbsp().as_ref(), &[0x06, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x80]);
        // Raw data keeps the escape bytes
        assert_eq!(nals[0].len(), 10);
    }

    #[test]
    fn test_rbsp_borrows_when_clean() {
        let data = [0x00, 0x00, 0x01, 0x65, 0x11, 0x22];
        let nals = find_nal_units(&data);
        assert!(matches!(nals[0].rbsp(), Cow::Borrowed(_)));
    }
}
