//! SMPP command status values inspected by the session.

pub const ESME_ROK: u32 = 0x0000_0000;
pub const ESME_RINVMSGLEN: u32 = 0x0000_0001;
pub const ESME_RINVCMDID: u32 = 0x0000_0003;
pub const ESME_RINVBNDSTS: u32 = 0x0000_0004;
pub const ESME_RALYBND: u32 = 0x0000_0005;
pub const ESME_RSYSERR: u32 = 0x0000_0008;
pub const ESME_RINVSRCADR: u32 = 0x0000_000A;
pub const ESME_RINVDSTADR: u32 = 0x0000_000B;
pub const ESME_RBINDFAIL: u32 = 0x0000_000D;
pub const ESME_RINVPASWD: u32 = 0x0000_000E;
pub const ESME_RINVSYSID: u32 = 0x0000_000F;
pub const ESME_RMSGQFUL: u32 = 0x0000_0014;
pub const ESME_RINVESMCLASS: u32 = 0x0000_0043;
pub const ESME_RSUBMITFAIL: u32 = 0x0000_0045;
pub const ESME_RINVDSTTON: u32 = 0x0000_0050;
pub const ESME_RINVDSTNPI: u32 = 0x0000_0051;
pub const ESME_RTHROTTLED: u32 = 0x0000_0058;
pub const ESME_RX_T_APPN: u32 = 0x0000_0064;
pub const ESME_RDELIVERYFAILURE: u32 = 0x0000_00FE;
pub const ESME_RUNKNOWNERR: u32 = 0x0000_00FF;
pub const ESME_RINVDCS: u32 = 0x0000_0104;
pub const ESME_RINVDSTADDRSUBUNIT: u32 = 0x0000_0106;

/// Mnemonic for a command status, `"UNKNOWN"` for codes not listed here.
pub fn name(status: u32) -> &'static str {
    match status {
        ESME_ROK => "ESME_ROK",
        ESME_RINVMSGLEN => "ESME_RINVMSGLEN",
        ESME_RINVCMDID => "ESME_RINVCMDID",
        ESME_RINVBNDSTS => "ESME_RINVBNDSTS",
        ESME_RALYBND => "ESME_RALYBND",
        ESME_RSYSERR => "ESME_RSYSERR",
        ESME_RINVSRCADR => "ESME_RINVSRCADR",
        ESME_RINVDSTADR => "ESME_RINVDSTADR",
        ESME_RBINDFAIL => "ESME_RBINDFAIL",
        ESME_RINVPASWD => "ESME_RINVPASWD",
        ESME_RINVSYSID => "ESME_RINVSYSID",
        ESME_RMSGQFUL => "ESME_RMSGQFUL",
        ESME_RINVESMCLASS => "ESME_RINVESMCLASS",
        ESME_RSUBMITFAIL => "ESME_RSUBMITFAIL",
        ESME_RINVDSTTON => "ESME_RINVDSTTON",
        ESME_RINVDSTNPI => "ESME_RINVDSTNPI",
        ESME_RTHROTTLED => "ESME_RTHROTTLED",
        ESME_RX_T_APPN => "ESME_RX_T_APPN",
        ESME_RDELIVERYFAILURE => "ESME_RDELIVERYFAILURE",
        ESME_RUNKNOWNERR => "ESME_RUNKNOWNERR",
        ESME_RINVDCS => "ESME_RINVDCS",
        ESME_RINVDSTADDRSUBUNIT => "ESME_RINVDSTADDRSUBUNIT",
        _ => "UNKNOWN",
    }
}

/// Statuses reporting a bad destination address, type of number or numbering plan.
pub fn is_invalid_destination(status: u32) -> bool {
    matches!(
        status,
        ESME_RINVDSTADR | ESME_RINVDSTTON | ESME_RINVDSTNPI | ESME_RINVDSTADDRSUBUNIT
    )
}
