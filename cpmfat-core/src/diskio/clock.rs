//! Real-time clock conversion for FAT timestamps.

use std::fmt;

use fatfs::{Date, DateTime, Time, TimeProvider};

/// 2017-09-21 18:44:15, used when the clock cannot be read.
pub const FALLBACK_FAT_TIME: u32 = ((17 + 20) << 25) | (9 << 21) | (21 << 16) | (18 << 11) | (44 << 5) | (15 >> 1);

pub fn bcd_to_bin(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// Pack a BCD clock record (year, month, day, hour, minute, second) into
/// the FAT date/time layout. The year is relative to 2000.
pub fn pack_fat_time(bcd: &[u8; 6]) -> u32 {
    let [year, month, day, hour, min, sec] = bcd.map(|b| bcd_to_bin(b) as u32);
    ((year + 20) << 25) | (month << 21) | (day << 16) | (hour << 11) | (min << 5) | (sec >> 1)
}

/// Split a packed FAT timestamp into (year, month, day, hour, minute, second).
pub fn unpack_fat_time(packed: u32) -> (u16, u8, u8, u8, u8, u8) {
    (
        1980 + (packed >> 25) as u16,
        ((packed >> 21) & 0x0F) as u8,
        ((packed >> 16) & 0x1F) as u8,
        ((packed >> 11) & 0x1F) as u8,
        ((packed >> 5) & 0x3F) as u8,
        ((packed & 0x1F) * 2) as u8,
    )
}

/// Time provider handing the FAT library a timestamp read from the clock
/// when the volume was mounted.
#[derive(Clone, Copy)]
pub(crate) struct RtcTimeProvider {
    packed: u32,
}

impl RtcTimeProvider {
    pub(crate) fn new(packed: u32) -> Self {
        Self { packed }
    }
}

impl fmt::Debug for RtcTimeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (y, mo, d, h, mi, s) = unpack_fat_time(self.packed);
        write!(f, "RtcTimeProvider({:04}-{:02}-{:02} {:02}:{:02}:{:02})", y, mo, d, h, mi, s)
    }
}

impl TimeProvider for RtcTimeProvider {
    fn get_current_date(&self) -> Date {
        self.get_current_date_time().date
    }

    fn get_current_date_time(&self) -> DateTime {
        let (year, month, day, hour, min, sec) = unpack_fat_time(self.packed);
        DateTime {
            date: Date {
                year,
                month: month as u16,
                day: day as u16,
            },
            time: Time {
                hour: hour as u16,
                min: min as u16,
                sec: sec as u16,
                millis: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcd_to_bin() {
        assert_eq!(bcd_to_bin(0x00), 0);
        assert_eq!(bcd_to_bin(0x09), 9);
        assert_eq!(bcd_to_bin(0x59), 59);
        assert_eq!(bcd_to_bin(0x99), 99);
    }

    #[test]
    fn test_pack_rounds_seconds_down() {
        let packed = pack_fat_time(&[0x23, 0x12, 0x31, 0x23, 0x59, 0x59]);
        assert_eq!(unpack_fat_time(packed), (2023, 12, 31, 23, 59, 58));
    }

    #[test]
    fn test_fallback_timestamp() {
        assert_eq!(unpack_fat_time(FALLBACK_FAT_TIME), (2017, 9, 21, 18, 44, 14));
        assert_eq!(
            FALLBACK_FAT_TIME,
            pack_fat_time(&[0x17, 0x09, 0x21, 0x18, 0x44, 0x15])
        );
    }

    #[test]
    fn test_time_provider_reports_mount_time() {
        let provider = RtcTimeProvider::new(pack_fat_time(&[0x24, 0x02, 0x29, 0x08, 0x05, 0x00]));
        let now = provider.get_current_date_time();
        assert_eq!((now.date.year, now.date.month, now.date.day), (2024, 2, 29));
        assert_eq!((now.time.hour, now.time.min, now.time.sec), (8, 5, 0));
    }
}
