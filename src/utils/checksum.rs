/// XOR checksum carried in every packet header.
pub struct CheckSum;

impl CheckSum {
    /// Computes a 16-bit XOR checksum over the given payload.
    ///
    /// # Arguments
    ///
    /// * `payload` - The bytes following the packet header.
    ///
    /// # Returns
    ///
    /// The XOR of every payload byte, widened to `u16`.
    pub fn new(payload: &[u8]) -> u16 {
        payload.iter().fold(0u16, |acc, &byte| acc ^ byte as u16)
    }

    /// Returns `true` when `checksum` matches the one computed for `payload`.
    pub fn check(checksum: u16, payload: &[u8]) -> bool {
        checksum == CheckSum::new(payload)
    }
}
