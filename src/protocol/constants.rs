/**
 * Apple's Bluetooth SIG company identifier, as found in the manufacturer
 * specific data of a BLE advertisement.
 */
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/**
 * The Continuity TLV message type carrying AirPods battery and charge status.
 */
pub const PROXIMITY_PAIRING_TYPE: u8 = 0x07;

/**
 * Content lengths (in bytes) of the Proximity Pairing message variants that
 * are understood by the decoder.
 */
pub const PROXIMITY_PAIRING_LENGTHS: [u8; 2] = [0x19, 0x11];

/**
 * The smallest manufacturer payload that could still hold a decodable
 * Proximity Pairing message.
 */
pub const MIN_PAYLOAD_LEN: usize = 15;

/**
 * Status byte bit indicating that the left/right nibbles are swapped.
 */
pub const FLIPPED_BIT: u8 = 0x02;

/**
 * A battery level at or below this percentage is considered low.
 */
pub const LOW_BATTERY_PERCENT: u8 = 20;

/**
 * Label used for a structurally valid Proximity Pairing message whose model
 * id is not in the table below.
 */
pub const FALLBACK_MODEL: &str = "AirPods";

/**
 * Known AirPods-family model ids, big-endian as they appear on the wire.
 */
pub fn model_name(model_id: u16) -> Option<&'static str> {
    match model_id {
        0x1420 => Some("AirPods Pro 2"),
        0x1520 => Some("AirPods Pro 2 (USB-C)"),
        0x2002 => Some("AirPods"),
        0x200F => Some("AirPods 2"),
        0x200E => Some("AirPods Pro"),
        0x2014 => Some("AirPods 3"),
        0x2024 => Some("AirPods Pro 2"),
        0x2013 => Some("AirPods Max"),
        0x6465 => Some("AirPods Pro"),
        0x4ABF => Some("AirPods Pro"),
        _ => None,
    }
}
