pub mod key_range {
    pub const BASIC_MIN: u8 = 0x4;
    pub const BASIC_A: u8 = 0x4;
    pub const BASIC_B: u8 = 0x5;
    pub const BASIC_1: u8 = 0x1e;
    pub const BASIC_0: u8 = 0x27;
    pub const BASIC_ENTER: u8 = 0x28;
    pub const BASIC_ESC: u8 = 0x29;
    pub const BASIC_SPACE: u8 = 0x2c;
    pub const BASIC_MAX: u8 = 0xa4;
    pub const MODIFIER_MIN: u8 = 0xe0;
    pub const MODIFIER_MAX: u8 = 0xe7;

    pub const LEFT_CTRL: u8 = 0xe0;
    pub const LEFT_SHIFT: u8 = 0xe1;
    pub const LEFT_ALT: u8 = 0xe2;
    pub const LEFT_GUI: u8 = 0xe3;

    pub fn is_modifier(code: u8) -> bool {
        (MODIFIER_MIN..=MODIFIER_MAX).contains(&code)
    }
}

pub mod report_id {
    pub const MOUSE: u8 = 2;
    pub const JOYSTICK: u8 = 5;
    pub const KEYBOARD: u8 = 6;
}

pub mod mouse_button {
    pub const LEFT: u8 = 1;
    pub const RIGHT: u8 = 2;
    pub const MIDDLE: u8 = 4;
}

pub mod joystick {
    pub const BUTTON_MAX: u8 = 32;

    pub const AXIS_X: u8 = 0;
    pub const AXIS_Y: u8 = 1;
    pub const AXIS_Z: u8 = 2;
    pub const AXIS_ZR: u8 = 3;
    pub const SLIDER_LEFT: u8 = 4;
    pub const SLIDER_RIGHT: u8 = 5;
    pub const AXIS_COUNT: u8 = 6;

    pub const AXIS_CENTER: u16 = 512;
    pub const AXIS_MAX: u16 = 1023;

    /// Hat switch null state.
    pub const HAT_CENTER: u8 = 0x0f;
}
