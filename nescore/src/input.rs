//! Controller ports at 0x4016/0x4017.

bitflags! {
    /// Standard controller buttons, in shift register order
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Button: u8 {
        const A      = 0b00000001;
        const B      = 0b00000010;
        const SELECT = 0b00000100;
        const START  = 0b00001000;
        const UP     = 0b00010000;
        const DOWN   = 0b00100000;
        const LEFT   = 0b01000000;
        const RIGHT  = 0b10000000;
    }
}

/// Something plugged into a controller port
pub trait InputDevice: Send {
    /// Bit 0 of a 0x4016 write
    fn set_strobe(&mut self, strobe: bool);

    /// Next serial bit, in bit 0
    fn poll(&mut self) -> u8;
}

#[derive(Debug, Default, Clone)]
pub struct StandardJoypad {
    buttons: Button,
    strobe: bool,
    current: u8,
}

impl StandardJoypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_buttons(&mut self, buttons: Button) {
        self.buttons = buttons;
    }

    pub fn press(&mut self, button: Button) {
        self.buttons.insert(button);
    }

    pub fn release(&mut self, button: Button) {
        self.buttons.remove(button);
    }

    pub fn buttons(&self) -> Button {
        self.buttons
    }
}

impl InputDevice for StandardJoypad {
    fn set_strobe(&mut self, strobe: bool) {
        self.strobe = strobe;
        self.current = 0;
    }

    fn poll(&mut self) -> u8 {
        if self.strobe {
            return self.buttons.contains(Button::A) as u8;
        }

        // an official pad shifts in ones once all eight buttons are out
        if self.current >= 8 {
            return 1;
        }

        let ret = (self.buttons.bits() >> self.current) & 0x01;
        self.current += 1;

        ret
    }
}
