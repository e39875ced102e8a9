use crate::queue::Observation;

pub const REGISTER_COUNT: usize = 16;

// The 6522's sixteen registers, in RS3..RS0 order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ViaRegister {
    PortB,
    PortA,
    DataDirB,
    DataDirA,
    Timer1Low,
    Timer1High,
    Timer1LatchLow,
    Timer1LatchHigh,
    Timer2Low,
    Timer2High,
    ShiftRegister,
    AuxiliaryControl,
    PeripheralControl,
    InterruptFlags,
    InterruptEnable,
    PortANoHandshake,
}

pub const ALL_REGISTERS: [ViaRegister; REGISTER_COUNT] = [
    ViaRegister::PortB,
    ViaRegister::PortA,
    ViaRegister::DataDirB,
    ViaRegister::DataDirA,
    ViaRegister::Timer1Low,
    ViaRegister::Timer1High,
    ViaRegister::Timer1LatchLow,
    ViaRegister::Timer1LatchHigh,
    ViaRegister::Timer2Low,
    ViaRegister::Timer2High,
    ViaRegister::ShiftRegister,
    ViaRegister::AuxiliaryControl,
    ViaRegister::PeripheralControl,
    ViaRegister::InterruptFlags,
    ViaRegister::InterruptEnable,
    ViaRegister::PortANoHandshake,
];

impl ViaRegister {
    pub fn from_index(index: u8) -> Self {
        ALL_REGISTERS[(index & 0x0f) as usize]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    // Short enough to fit the 15 columns left of the screen edge.
    pub fn label(self) -> &'static str {
        match self {
            ViaRegister::PortB             => "Port B",
            ViaRegister::PortA             => "Port A",
            ViaRegister::DataDirB          => "Dir B",
            ViaRegister::DataDirA          => "Dir A",
            ViaRegister::Timer1Low         => "Timer 1 L",
            ViaRegister::Timer1High        => "Timer 1 H",
            ViaRegister::Timer1LatchLow    => "T1 Latch L",
            ViaRegister::Timer1LatchHigh   => "T1 Latch H",
            ViaRegister::Timer2Low         => "Timer 2 L",
            ViaRegister::Timer2High        => "Timer 2 H",
            ViaRegister::ShiftRegister     => "Shift Reg",
            ViaRegister::AuxiliaryControl  => "Aux Ctrl",
            ViaRegister::PeripheralControl => "Periph Ctrl",
            ViaRegister::InterruptFlags    => "Int Flags",
            ViaRegister::InterruptEnable   => "Int Enable",
            ViaRegister::PortANoHandshake  => "PA No HShake",
        }
    }
}

// Bit positions shared by the interrupt flag (IFR) and enable (IER) registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IrqFlag {
    CA2,
    CA1,
    Shift,
    CB2,
    CB1,
    Timer2,
    Timer1,
    // IRQ summary in the IFR, set/clear control in the IER
    SetClear,
}

pub const ALL_IRQ_FLAGS: [IrqFlag; 8] = [
    IrqFlag::CA2,
    IrqFlag::CA1,
    IrqFlag::Shift,
    IrqFlag::CB2,
    IrqFlag::CB1,
    IrqFlag::Timer2,
    IrqFlag::Timer1,
    IrqFlag::SetClear,
];

impl IrqFlag {
    pub fn mask(self) -> u8 {
        1 << (self as u8)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            IrqFlag::CA2      => "CA2",
            IrqFlag::CA1      => "CA1",
            IrqFlag::Shift    => "SR",
            IrqFlag::CB2      => "CB2",
            IrqFlag::CB1      => "CB1",
            IrqFlag::Timer2   => "T2",
            IrqFlag::Timer1   => "T1",
            IrqFlag::SetClear => "IRQ",
        }
    }

    pub fn is_set(self, val: u8) -> bool {
        (val & self.mask()) != 0
    }
}

// Shadow copy of the VIA's registers, as last seen on the bus. Only the
// renderer holds one, and it only changes through `apply`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u8; REGISTER_COUNT],
}

impl RegisterFile {
    pub fn new_register_file() -> Self {
        Self {
            regs: [0; REGISTER_COUNT],
        }
    }

    pub fn apply(&mut self, observation: Observation) {
        self.regs[(observation.register & 0x0f) as usize] = observation.value;
    }

    pub fn get(&self, reg: ViaRegister) -> u8 {
        self.regs[reg as usize]
    }

    pub fn as_bytes(&self) -> &[u8; REGISTER_COUNT] {
        &self.regs
    }

    fn pair(&self, lo: ViaRegister) -> u16 {
        let lo = lo as usize;
        (self.regs[lo + 1] as u16) << 8 | self.regs[lo] as u16
    }

    pub fn port_b(&self) -> u8 { self.get(ViaRegister::PortB) }
    pub fn port_a(&self) -> u8 { self.get(ViaRegister::PortA) }
    pub fn ddr_b(&self) -> u8 { self.get(ViaRegister::DataDirB) }
    pub fn ddr_a(&self) -> u8 { self.get(ViaRegister::DataDirA) }
    pub fn shift_register(&self) -> u8 { self.get(ViaRegister::ShiftRegister) }
    pub fn acr(&self) -> u8 { self.get(ViaRegister::AuxiliaryControl) }
    pub fn pcr(&self) -> u8 { self.get(ViaRegister::PeripheralControl) }
    pub fn ifr(&self) -> u8 { self.get(ViaRegister::InterruptFlags) }
    pub fn ier(&self) -> u8 { self.get(ViaRegister::InterruptEnable) }
    pub fn port_a_no_handshake(&self) -> u8 { self.get(ViaRegister::PortANoHandshake) }

    //
    // 16-bit timer views, low byte at the lower register
    //
    pub fn timer1(&self) -> u16 { self.pair(ViaRegister::Timer1Low) }
    pub fn timer1_latch(&self) -> u16 { self.pair(ViaRegister::Timer1LatchLow) }
    pub fn timer2(&self) -> u16 { self.pair(ViaRegister::Timer2Low) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut regs = RegisterFile::new_register_file();

        regs.apply(Observation::new(4, 0x26));
        regs.apply(Observation::new(5, 0x48));
        regs.apply(Observation::new(4, 0x00));

        assert_eq!(regs.get(ViaRegister::Timer1Low), 0x00);
        assert_eq!(regs.get(ViaRegister::Timer1High), 0x48);
        assert_eq!(regs.timer1(), 0x4800);
    }

    #[test]
    fn test_timer_pairs() {
        let mut regs = RegisterFile::new_register_file();

        regs.apply(Observation::new(6, 0x26));
        regs.apply(Observation::new(7, 0x48));
        regs.apply(Observation::new(8, 0xff));
        regs.apply(Observation::new(9, 0x01));

        assert_eq!(regs.timer1_latch(), 0x4826);
        assert_eq!(regs.timer2(), 0x01ff);
        assert_eq!(regs.timer1(), 0);
    }

    #[test]
    fn test_out_of_range_index_is_masked() {
        let mut regs = RegisterFile::new_register_file();

        regs.apply(Observation::new(0x1e, 0x40));

        assert_eq!(regs.ier(), 0x40);
        assert_eq!(regs.as_bytes().iter().filter(|&&b| b != 0).count(), 1);
    }

    #[test]
    fn test_register_order() {
        for (i, reg) in ALL_REGISTERS.iter().enumerate() {
            assert_eq!(reg.index() as usize, i);
            assert_eq!(ViaRegister::from_index(i as u8), *reg);
            assert!(reg.label().len() < 16);
        }
    }

    #[test]
    fn test_irq_flags() {
        // Timer 1 fired, IRQ line asserted
        let ifr = 0b1100_0000;

        let set = ALL_IRQ_FLAGS.iter()
            .filter(|f| f.is_set(ifr))
            .map(|f| f.mnemonic())
            .collect::<Vec<_>>();

        assert_eq!(set, vec!["T1", "IRQ"]);
        assert_eq!(IrqFlag::CB1.mask(), 0b0001_0000);
    }
}
