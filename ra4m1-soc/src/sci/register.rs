use arbitrary_int::u2;
use bitbybit::bitfield;

// Window-relative offsets of the byte-wide channel registers.
pub(crate) const SMR_OFF: u32 = 0;
pub(crate) const BRR_OFF: u32 = 1;
pub(crate) const SCR_OFF: u32 = 2;
pub(crate) const TDR_OFF: u32 = 3;
pub(crate) const SSR_OFF: u32 = 4;
pub(crate) const RDR_OFF: u32 = 5;
pub(crate) const SCMR_OFF: u32 = 6;
pub(crate) const SEMR_OFF: u32 = 7;

/// Serial Mode Register.
#[bitfield(u8)]
#[derive(Debug, PartialEq, Eq)]
pub struct Smr {
    /// Communication mode: asynchronous (0) or clock synchronous (1).
    #[bit(7, rw)]
    pub cm: bool,

    /// Character length: 8 bits (0) or 7 bits (1).
    #[bit(6, rw)]
    pub chr: bool,

    /// Parity enable.
    #[bit(5, rw)]
    pub pe: bool,

    /// Parity mode: even (0) or odd (1).
    #[bit(4, rw)]
    pub pm: bool,

    /// Stop bit length: 1 (0) or 2 (1).
    #[bit(3, rw)]
    pub stop: bool,

    /// Multi-processor mode.
    #[bit(2, rw)]
    pub mp: bool,

    /// Clock select: the peripheral clock divided by 1, 4, 16 or 64.
    #[bits(0..=1, rw)]
    pub cks: u2,
}

/// Serial Control Register.
#[bitfield(u8)]
#[derive(Debug, PartialEq, Eq)]
pub struct Scr {
    /// Transmit interrupt enable.
    #[bit(7, rw)]
    pub tie: bool,

    /// Receive interrupt enable. Also gates the error event pin.
    #[bit(6, rw)]
    pub rie: bool,

    /// Transmitter enable.
    #[bit(5, rw)]
    pub te: bool,

    /// Receiver enable.
    #[bit(4, rw)]
    pub re: bool,

    /// Multi-processor interrupt enable.
    #[bit(3, rw)]
    pub mpie: bool,

    /// Transmit-end interrupt enable.
    #[bit(2, rw)]
    pub teie: bool,

    /// Clock enable.
    #[bits(0..=1, rw)]
    pub cke: u2,
}

/// Serial Status Register.
#[bitfield(u8)]
#[derive(Debug, PartialEq, Eq)]
pub struct Ssr {
    /// Transmit data register empty.
    #[bit(7, rw)]
    pub tdre: bool,

    /// Receive data register full.
    #[bit(6, rw)]
    pub rdrf: bool,

    /// Overrun error.
    #[bit(5, rw)]
    pub orer: bool,

    /// Framing error.
    #[bit(4, rw)]
    pub fer: bool,

    /// Parity error.
    #[bit(3, rw)]
    pub per: bool,

    /// Transmit end.
    #[bit(2, rw)]
    pub tend: bool,

    /// Multi-processor bit.
    #[bit(1, rw)]
    pub mpb: bool,

    /// Multi-processor bit transfer.
    #[bit(0, rw)]
    pub mpbt: bool,
}

/// SSR bits the guest clears by writing zero after reading one.
pub(crate) const SSR_CLEAR_MASK: u8 = 0x78;
