use log::debug;

use crate::protocol::constants::{
    model_name, APPLE_COMPANY_ID, FALLBACK_MODEL, FLIPPED_BIT, MIN_PAYLOAD_LEN,
    PROXIMITY_PAIRING_LENGTHS, PROXIMITY_PAIRING_TYPE,
};
use crate::protocol::types::BatteryReading;

/// Decode Apple manufacturer specific advertisement data.
///
/// `data` is the manufacturer payload with the company id already stripped.
/// Returns `None` for anything that is not a decodable Proximity Pairing
/// message: wrong company id, short buffer, no matching TLV record. Malformed
/// input is never an error, the advertisement is simply ignored.
pub fn parse_manufacturer_data(company_id: u16, data: &[u8]) -> Option<BatteryReading> {
    if company_id != APPLE_COMPANY_ID {
        return None;
    }

    if data.len() < MIN_PAYLOAD_LEN {
        return None;
    }

    let offset = find_proximity_pairing_offset(data)?;
    decode_proximity_pairing(data, offset)
}

/// Locate a Proximity Pairing record within a TLV-encoded Continuity payload.
///
/// Walks the buffer from offset 0, advancing by `2 + length` per record (by 2
/// when the length byte is 0, so malformed input cannot stall the walk). A
/// candidate is accepted only when its full content fits in the buffer.
/// Returns the offset of the type byte.
pub fn find_proximity_pairing_offset(data: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 1 < data.len() {
        let msg_type = data[i];
        let msg_len = data[i + 1] as usize;

        if msg_type == PROXIMITY_PAIRING_TYPE
            && PROXIMITY_PAIRING_LENGTHS.contains(&data[i + 1])
            && i + 2 + msg_len <= data.len()
        {
            return Some(i);
        }

        i += if msg_len > 0 { 2 + msg_len } else { 2 };
    }
    None
}

/**
 * Decode battery and status fields from a located Proximity Pairing record.
 *
 * Byte layout relative to the type byte at `offset`:
 *   [0]  message type (0x07)
 *   [1]  content length (0x19 or 0x11)
 *   [2]  prefix / reserved
 *   [3]  model id (high byte)
 *   [4]  model id (low byte)
 *   [5]  status byte
 *   [6]  pods byte (left nibble | right nibble)
 *   [7]  charge flags nibble | case battery nibble
 *   [8]  lid open counter
 *   [9+] encrypted / reserved
 */
fn decode_proximity_pairing(data: &[u8], offset: usize) -> Option<BatteryReading> {
    let base = offset + 2;
    let Some(fields) = data.get(base..base + 6) else {
        debug!("proximity pairing record at {offset} too short to decode");
        return None;
    };

    let model_id = u16::from_be_bytes([fields[1], fields[2]]);
    let model = model_name(model_id).unwrap_or(FALLBACK_MODEL);

    let status_byte = fields[3];
    let pods_byte = fields[4];
    let flags_case_byte = fields[5];

    let flipped = status_byte & FLIPPED_BIT != 0;

    let mut left_nibble = (pods_byte >> 4) & 0x0F;
    let mut right_nibble = pods_byte & 0x0F;
    if flipped {
        std::mem::swap(&mut left_nibble, &mut right_nibble);
    }

    let case_nibble = flags_case_byte & 0x0F;
    let charge_flags = (flags_case_byte >> 4) & 0x0F;

    // The flip bit swaps which charge bit belongs to which pod; the case bit
    // is unaffected.
    let (left_bit, right_bit) = if flipped { (0x01, 0x02) } else { (0x02, 0x01) };

    Some(BatteryReading {
        left_battery: nibble_to_percent(left_nibble),
        right_battery: nibble_to_percent(right_nibble),
        case_battery: nibble_to_percent(case_nibble),
        left_charging: charge_flags & left_bit != 0,
        right_charging: charge_flags & right_bit != 0,
        case_charging: charge_flags & 0x04 != 0,
        model,
        raw_status: status_byte,
    })
}

/// Convert a 4-bit battery nibble (0..=10) to a percentage.
///
/// 0xF, or any other value above 10, means the level is unavailable.
fn nibble_to_percent(nibble: u8) -> Option<u8> {
    if nibble > 10 {
        None
    } else {
        Some(nibble * 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_payload(
        model_hi: u8,
        model_lo: u8,
        status: u8,
        pods_byte: u8,
        flags_case: u8,
    ) -> Vec<u8> {
        let mut payload = vec![
            PROXIMITY_PAIRING_TYPE,
            0x19, // content length
            0x01, // prefix/reserved
            model_hi,
            model_lo,
            status,
            pods_byte,
            flags_case,
            0x01, // lid open counter
        ];
        payload.resize(2 + 0x19, 0x00);
        payload
    }

    // Left=10 (100%), Right=5 (50%), Case=7 (70%), nothing charging.
    fn default_payload() -> Vec<u8> {
        build_payload(0x14, 0x20, 0x00, 0xA5, 0x07)
    }

    #[test]
    fn valid_airpods_pro_2_packet() {
        let reading = parse_manufacturer_data(APPLE_COMPANY_ID, &default_payload()).unwrap();
        assert_eq!(reading.model, "AirPods Pro 2");
        assert_eq!(reading.left_battery, Some(100));
        assert_eq!(reading.right_battery, Some(50));
        assert_eq!(reading.case_battery, Some(70));
        assert!(!reading.left_charging);
        assert!(!reading.right_charging);
        assert!(!reading.case_charging);
    }

    #[test]
    fn usb_c_variant_is_recognized() {
        let payload = build_payload(0x15, 0x20, 0x00, 0xA5, 0x07);
        let reading = parse_manufacturer_data(APPLE_COMPANY_ID, &payload).unwrap();
        assert_eq!(reading.model, "AirPods Pro 2 (USB-C)");
    }

    #[test]
    fn unavailable_battery_nibbles_decode_as_none() {
        let payload = build_payload(0x14, 0x20, 0x00, 0xFF, 0x0F);
        let reading = parse_manufacturer_data(APPLE_COMPANY_ID, &payload).unwrap();
        assert_eq!(reading.left_battery, None);
        assert_eq!(reading.right_battery, None);
        assert_eq!(reading.case_battery, None);
    }

    #[test]
    fn non_apple_company_id_is_rejected() {
        assert_eq!(parse_manufacturer_data(0x1234, &default_payload()), None);
    }

    #[test]
    fn unrecognized_model_falls_back_to_generic_label() {
        let payload = build_payload(0xFF, 0xFF, 0x00, 0xA5, 0x07);
        let reading = parse_manufacturer_data(APPLE_COMPANY_ID, &payload).unwrap();
        assert_eq!(reading.model, FALLBACK_MODEL);
        assert_eq!(reading.left_battery, Some(100));
    }

    #[test]
    fn truncated_data_yields_no_reading() {
        let result = parse_manufacturer_data(APPLE_COMPANY_ID, &[0x07, 0x19, 0x01]);
        assert_eq!(result, None);
    }

    #[test]
    fn empty_data_yields_no_reading() {
        assert_eq!(parse_manufacturer_data(APPLE_COMPANY_ID, &[]), None);
    }

    #[test]
    fn wrong_message_type_is_ignored() {
        let mut payload = default_payload();
        payload[0] = 0x03;
        assert_eq!(parse_manufacturer_data(APPLE_COMPANY_ID, &payload), None);
    }

    #[test]
    fn charging_flags_decode() {
        // Charge flags = 6 (left + case), case = 7.
        let payload = build_payload(0x14, 0x20, 0x00, 0xA5, 0x67);
        let reading = parse_manufacturer_data(APPLE_COMPANY_ID, &payload).unwrap();
        assert!(reading.left_charging);
        assert!(!reading.right_charging);
        assert!(reading.case_charging);
    }

    #[test]
    fn flipped_bit_swaps_left_and_right() {
        let unflipped =
            parse_manufacturer_data(APPLE_COMPANY_ID, &build_payload(0x14, 0x20, 0x00, 0xA5, 0x27))
                .unwrap();
        let flipped =
            parse_manufacturer_data(APPLE_COMPANY_ID, &build_payload(0x14, 0x20, 0x02, 0xA5, 0x27))
                .unwrap();

        assert_eq!(unflipped.left_battery, Some(100));
        assert_eq!(unflipped.right_battery, Some(50));
        assert!(unflipped.left_charging);
        assert!(!unflipped.right_charging);

        // The exact mirror of the unflipped decoding of the same raw bytes.
        assert_eq!(flipped.left_battery, Some(50));
        assert_eq!(flipped.right_battery, Some(100));
        assert!(!flipped.left_charging);
        assert!(flipped.right_charging);
    }

    #[test]
    fn zero_nibble_maps_to_zero_percent() {
        let payload = build_payload(0x14, 0x20, 0x00, 0x00, 0x00);
        let reading = parse_manufacturer_data(APPLE_COMPANY_ID, &payload).unwrap();
        assert_eq!(reading.left_battery, Some(0));
        assert_eq!(reading.right_battery, Some(0));
        assert_eq!(reading.case_battery, Some(0));
    }

    #[test]
    fn nibble_ten_maps_to_full() {
        let payload = build_payload(0x14, 0x20, 0x00, 0xAA, 0x0A);
        let reading = parse_manufacturer_data(APPLE_COMPANY_ID, &payload).unwrap();
        assert_eq!(reading.left_battery, Some(100));
        assert_eq!(reading.right_battery, Some(100));
        assert_eq!(reading.case_battery, Some(100));
    }

    #[test]
    fn nibble_values_above_ten_are_unavailable() {
        for nibble in 11..=15u8 {
            assert_eq!(nibble_to_percent(nibble), None);
        }
        for nibble in 0..=10u8 {
            assert_eq!(nibble_to_percent(nibble), Some(nibble * 10));
        }
    }

    #[test]
    fn decoding_is_idempotent() {
        let payload = default_payload();
        let first = parse_manufacturer_data(APPLE_COMPANY_ID, &payload);
        let second = parse_manufacturer_data(APPLE_COMPANY_ID, &payload);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn seventeen_byte_variant_decodes() {
        let mut payload = vec![
            PROXIMITY_PAIRING_TYPE,
            0x11, // 17 byte content
            0x06, // prefix
            0x64, 0x65, // model 0x6465
            0x9C, // status
            0x45, // pods: left=4, right=5
            0xA4, // flags/case: case=4
        ];
        payload.resize(2 + 0x11, 0x00);

        let reading = parse_manufacturer_data(APPLE_COMPANY_ID, &payload).unwrap();
        assert_eq!(reading.model, "AirPods Pro");
        assert_eq!(reading.left_battery, Some(40));
        assert_eq!(reading.right_battery, Some(50));
        assert_eq!(reading.case_battery, Some(40));
    }

    #[test]
    fn record_is_found_past_leading_records() {
        // A 3-byte record of another type in front of the real one.
        let mut payload = vec![0x10, 0x03, 0xAA, 0xBB, 0xCC];
        payload.extend(default_payload());
        let offset = find_proximity_pairing_offset(&payload);
        assert_eq!(offset, Some(5));
        assert!(parse_manufacturer_data(APPLE_COMPANY_ID, &payload).is_some());
    }

    #[test]
    fn zero_length_record_does_not_stall_the_walk() {
        let mut payload = vec![0x10, 0x00, 0x12, 0x00];
        payload.extend(default_payload());
        assert_eq!(find_proximity_pairing_offset(&payload), Some(4));
    }

    #[test]
    fn candidate_without_enough_content_is_skipped() {
        // Type/length match but the buffer ends before the content does.
        let payload = vec![0x07, 0x19, 0x01, 0x14, 0x20, 0x00, 0xA5, 0x07];
        assert_eq!(find_proximity_pairing_offset(&payload), None);
    }

    #[test]
    fn buffers_shorter_than_two_bytes_find_nothing() {
        assert_eq!(find_proximity_pairing_offset(&[]), None);
        assert_eq!(find_proximity_pairing_offset(&[0x07]), None);
    }

    #[test]
    fn low_battery_detection() {
        let low = build_payload(0x14, 0x20, 0x00, 0xA2, 0x07);
        let reading = parse_manufacturer_data(APPLE_COMPANY_ID, &low).unwrap();
        assert!(reading.is_low());

        let ok = parse_manufacturer_data(APPLE_COMPANY_ID, &default_payload()).unwrap();
        assert!(!ok.is_low());
    }
}
