/// dword 位域读写工具
///
/// 位区间使用闭区间 `[low, high]`，与硬件手册中的写法一致。
pub struct BitField {}
impl BitField {
    #[inline]
    pub const fn mask(low: u32, high: u32) -> u32 {
        let width = high - low + 1;
        if width >= 32 { u32::MAX } else { ((1u32 << width) - 1) << low }
    }

    /// 将 `value` 写入 `dword` 的 `[low, high]` 位，超出位宽的高位被截断
    #[inline]
    pub fn set(dword: &mut u32, low: u32, high: u32, value: u32) {
        let mask = Self::mask(low, high);
        *dword = (*dword & !mask) | ((value << low) & mask);
    }

    #[inline]
    pub fn get(dword: u32, low: u32, high: u32) -> u32 {
        (dword & Self::mask(low, high)) >> low
    }

    #[inline]
    pub fn flag(dword: &mut u32, bit: u32, on: bool) {
        Self::set(dword, bit, bit, on as u32);
    }

    /// 按小端序展开为字节，硬件按小端读取 dword
    pub fn dwords_to_le_bytes(dwords: &[u32]) -> Vec<u8> {
        dwords.iter().flat_map(|dw| dw.to_le_bytes()).collect()
    }

    pub fn le_bytes_to_dwords(bytes: &[u8]) -> Vec<u32> {
        bytes.chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
    }
}
