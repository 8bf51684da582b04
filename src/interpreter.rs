//! # interpreter
//!
//! The virtual machine proper: memory, registers, call stack, timers, key
//! state and a framebuffer, plus fetch/decode/execute.
//!
//! Frontends drive it by calling [`Chip8Interpreter::tick`] (or
//! [`Chip8Interpreter::frame`]) at their own rate and forwarding key presses
//! and releases. The two timers pace themselves off the `dt` passed in, so
//! they count down in real time however many instructions run per frame.
//!
//! `Fx0A` does not block: the machine parks on the instruction and each tick
//! checks the keys until one is down.
use std::collections::BTreeMap;
use std::fmt;
use std::io;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Chip8Error, Result};
use crate::instruction::{Instruction, INSTRUCTION_LENGTH};
use crate::memory::{
    self, Memory, MemoryMap, DEFAULT_DIGITS, DEFAULT_EXECUTION_START, DEFAULT_MEMORY_SIZE,
};
use crate::timer::Timer;
use crate::video::{Framebuffer, VideoRam};

/// number of general purpose registers, V0..VF
pub const REG_COUNT: usize = 16;
/// number of keys on the hex keypad
pub const KEY_COUNT: usize = 16;
/// flags register
pub const VF: usize = 0xF;

/// Construction parameters for the machine
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub display_width: usize,
    pub display_height: usize,
    pub display_wrap: bool,
    pub memory_size: usize,
    pub execution_start: u16,
    /// where the hex digit font is loaded
    pub digit_start: u16,
    /// instructions run by each call to `tick`
    pub instructions_per_tick: usize,
    /// ticks run by each call to `frame`
    pub instructions_per_frame: usize,
    pub frames_per_second: usize,
    /// seed for `Cxkk`; None draws one from the OS
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            display_width: 64,
            display_height: 32,
            display_wrap: false,
            memory_size: DEFAULT_MEMORY_SIZE,
            execution_start: DEFAULT_EXECUTION_START,
            digit_start: 0x000,
            instructions_per_tick: 1,
            instructions_per_frame: 20,
            frames_per_second: 30,
            rng_seed: None,
        }
    }
}

impl Config {
    /// seconds of machine time covered by one instruction slot
    pub fn tick_length(&self) -> f64 {
        1.0 / (self.instructions_per_frame * self.frames_per_second).max(1) as f64
    }
}

/// A named program address that frontends can pause on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    pub address: u16,
    pub name: String,
}

impl Breakpoint {
    pub fn new(address: u16, name: Option<&str>) -> Self {
        Breakpoint {
            address,
            name: name
                .map(str::to_owned)
                .unwrap_or_else(|| format!("breakpoint-{:#x}", address)),
        }
    }
}

/// Read-only snapshot of machine state for debuggers and frontends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmState {
    pub program_counter: u16,
    /// raw word at the program counter, 0 if it points outside memory
    pub next_instruction: u16,
    pub v_registers: [u8; REG_COUNT],
    pub i_register: u16,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub stack: Vec<u16>,
    pub keys: [bool; KEY_COUNT],
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = |bytes: &[u8]| {
            bytes
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let stack = self
            .stack
            .iter()
            .map(|a| format!("0x{:03X}", a))
            .collect::<Vec<_>>()
            .join(", ");
        let keys: String = self
            .keys
            .iter()
            .enumerate()
            .filter(|(_, down)| **down)
            .map(|(k, _)| format!("{:X}", k))
            .collect();
        writeln!(f, "== state ==")?;
        writeln!(
            f,
            "PC       : 0x{:04X} @ 0x{:03X}",
            self.next_instruction, self.program_counter
        )?;
        writeln!(f, "I        : 0x{:03X}", self.i_register)?;
        writeln!(f, "timers   : DT={:02X} ST={:02X}", self.delay_timer, self.sound_timer)?;
        writeln!(f, "stack    : [{}]", stack)?;
        writeln!(f, "registers: {}", hex(&self.v_registers))?;
        writeln!(f, "keys     : [{}]", keys)
    }
}

/// how the program counter moves once a handler is done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    Next,
    Skip,
    Stay,
}

impl Advance {
    fn skip_if(cond: bool) -> Self {
        if cond {
            Advance::Skip
        } else {
            Advance::Next
        }
    }

    fn increment(self) -> u16 {
        match self {
            Advance::Next => INSTRUCTION_LENGTH,
            Advance::Skip => 2 * INSTRUCTION_LENGTH,
            Advance::Stay => 0,
        }
    }
}

pub struct Chip8Interpreter<F: Framebuffer = VideoRam> {
    config: Config,
    memory: Memory,
    video_ram: F,
    program_counter: u16,
    i_register: u16,
    v_registers: [u8; REG_COUNT],
    call_stack: Vec<u16>,
    delay_timer: Timer,
    sound_timer: Timer,
    keys: [bool; KEY_COUNT],
    /// register to receive the next key press, while blocked on `Fx0A`
    waiting_register: Option<usize>,
    digits_memory_location: u16,
    digit_length: usize,
    rng: StdRng,
    breakpoints: BTreeMap<u16, Breakpoint>,
    instruction_unhandled: bool,
}

impl Chip8Interpreter<VideoRam> {
    /// a standard 64x32, 4K machine
    pub fn new() -> Result<Self> {
        Chip8Interpreter::with_config(Config::default())
    }
}

impl<F: Framebuffer> Chip8Interpreter<F> {
    pub fn with_config(config: Config) -> Result<Self> {
        let video_ram = F::create(config.display_width, config.display_height, config.display_wrap)?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut vm = Chip8Interpreter {
            memory: Memory::new(config.memory_size),
            video_ram,
            program_counter: config.execution_start,
            i_register: 0,
            v_registers: [0; REG_COUNT],
            call_stack: Vec::new(),
            delay_timer: Timer::default(),
            sound_timer: Timer::default(),
            keys: [false; KEY_COUNT],
            waiting_register: None,
            digits_memory_location: 0,
            digit_length: 0,
            rng,
            breakpoints: BTreeMap::new(),
            instruction_unhandled: false,
            config,
        };
        vm.load_digits(&DEFAULT_DIGITS, vm.config.digit_start)?;
        Ok(vm)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// copy `data` into memory at `location`
    pub fn load_to_memory(&mut self, data: &[u8], location: usize) -> Result<()> {
        self.memory.write(data, location)
    }

    /// load hex digit sprites; `Fx29` will point into them from now on
    pub fn load_digits(&mut self, digits: &[&[u8]], location: u16) -> Result<()> {
        let stride = memory::load_digits(&mut self.memory, digits, location as usize)?;
        self.digits_memory_location = location;
        self.digit_length = stride;
        Ok(())
    }

    /// load a program image at the execution start address
    pub fn load_rom(&mut self, reader: &mut impl io::Read) -> Result<usize> {
        let mut rom = Vec::new();
        reader.read_to_end(&mut rom)?;
        let start = self.config.execution_start as usize;
        let max = self.memory.size().saturating_sub(start);
        if rom.len() > max {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max,
            });
        }
        self.load_to_memory(&rom, start)?;
        log::debug!("loaded {} byte ROM at 0x{:03X}", rom.len(), start);
        Ok(rom.len())
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn video_ram(&self) -> &F {
        &self.video_ram
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn i_register(&self) -> u16 {
        self.i_register
    }

    pub fn v_registers(&self) -> &[u8; REG_COUNT] {
        &self.v_registers
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer.value
    }

    pub fn set_delay_timer(&mut self, value: u8) {
        self.delay_timer.value = value;
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer.value
    }

    pub fn set_sound_timer(&mut self, value: u8) {
        self.sound_timer.value = value;
    }

    /// register index `Fx0A` is waiting to fill, if the machine is blocked
    pub fn waiting_for_key(&self) -> Option<usize> {
        self.waiting_register
    }

    /// whether the last instruction failed to match any handler
    pub fn instruction_unhandled(&self) -> bool {
        self.instruction_unhandled
    }

    fn key_index(key: u8) -> Result<usize> {
        if key as usize >= KEY_COUNT {
            return Err(Chip8Error::InvalidKey(key));
        }
        Ok(key as usize)
    }

    pub fn press(&mut self, key: u8) -> Result<()> {
        self.keys[Self::key_index(key)?] = true;
        Ok(())
    }

    pub fn release(&mut self, key: u8) -> Result<()> {
        self.keys[Self::key_index(key)?] = false;
        Ok(())
    }

    pub fn pressed(&self, key: u8) -> Result<bool> {
        Ok(self.keys[Self::key_index(key)?])
    }

    /// jump to `location`, remembering where we came from
    pub fn stack_call(&mut self, location: u16) {
        self.call_stack.push(self.program_counter);
        self.program_counter = location;
    }

    /// go back to the last call site
    pub fn stack_return(&mut self) -> Result<()> {
        self.program_counter = self
            .call_stack
            .pop()
            .ok_or(Chip8Error::StackUnderflow {
                address: self.program_counter,
            })?;
        Ok(())
    }

    pub fn stack_size(&self) -> usize {
        self.call_stack.len()
    }

    pub fn stack_top(&self) -> Option<u16> {
        self.call_stack.last().copied()
    }

    pub fn add_breakpoint(&mut self, breakpoint: Breakpoint) {
        self.breakpoints.insert(breakpoint.address, breakpoint);
    }

    pub fn remove_breakpoint(&mut self, address: u16) -> Option<Breakpoint> {
        self.breakpoints.remove(&address)
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    /// the breakpoint at the current program counter, if any
    pub fn breakpoint_hit(&self) -> Option<&Breakpoint> {
        self.breakpoints.get(&self.program_counter)
    }

    /// snapshot registers, stack, timers and keys without touching anything
    pub fn dump_state(&self) -> VmState {
        VmState {
            program_counter: self.program_counter,
            next_instruction: self
                .memory
                .get_word(self.program_counter as usize)
                .unwrap_or(0),
            v_registers: self.v_registers,
            i_register: self.i_register,
            delay_timer: self.delay_timer.value,
            sound_timer: self.sound_timer.value,
            stack: self.call_stack.clone(),
            keys: self.keys,
        }
    }

    /// Advance the timers by `dt` seconds, then run up to
    /// `instructions_per_tick` instructions unless blocked waiting for a key.
    /// Timers run even while blocked. A key press that ends the wait lets
    /// execution carry on in the same tick.
    pub fn tick(&mut self, dt: f64) -> Result<()> {
        self.delay_timer.tick(dt);
        self.sound_timer.tick(dt);

        for _ in 0..self.config.instructions_per_tick {
            if !self.resolve_key_wait() {
                break;
            }
            self.execute_instruction()?;
        }
        Ok(())
    }

    /// one display frame's worth of ticks
    pub fn frame(&mut self) -> Result<()> {
        let dt = self.config.tick_length();
        for _ in 0..self.config.instructions_per_frame {
            self.tick(dt)?;
        }
        Ok(())
    }

    /// Store the lowest pressed key, if any, and move past the `Fx0A`.
    /// False while still blocked; true when not waiting at all.
    fn resolve_key_wait(&mut self) -> bool {
        let register = match self.waiting_register {
            Some(register) => register,
            None => return true,
        };
        match self.keys.iter().position(|down| *down) {
            Some(key) => {
                log::debug!("key {:X} pressed, stored in V{:X}", key, register);
                self.v_registers[register] = key as u8;
                self.waiting_register = None;
                self.program_counter = self.program_counter.wrapping_add(INSTRUCTION_LENGTH);
                true
            }
            None => false,
        }
    }

    /// fetch, decode and execute the instruction at the program counter
    pub fn execute_instruction(&mut self) -> Result<()> {
        self.instruction_unhandled = false;
        let address = self.program_counter;
        let word = self.memory.get_word(address as usize)?;
        let instruction = Instruction::from_word(word)?;
        log::trace!("0x{:03X}: {}", address, instruction);

        let advance = match self.dispatch(instruction)? {
            Some(advance) => advance,
            None => {
                self.instruction_unhandled = true;
                return Err(Chip8Error::UnhandledInstruction { word, address });
            }
        };
        self.program_counter = self.program_counter.wrapping_add(advance.increment());
        Ok(())
    }

    /// run the handler for a decoded instruction; None if nothing matched
    fn dispatch(&mut self, instruction: Instruction) -> Result<Option<Advance>> {
        match instruction {
            Instruction::Iiii { selector } => self.handle_iiii(selector),
            Instruction::Innn { type_nibble, nnn } => Ok(self.handle_innn(type_nibble, nnn)),
            Instruction::Ixii {
                type_nibble,
                x,
                selector,
            } => self.handle_ixii(type_nibble, x as usize, selector),
            Instruction::Ixkk { type_nibble, x, kk } => {
                Ok(self.handle_ixkk(type_nibble, x as usize, kk))
            }
            Instruction::Ixyi {
                type_nibble,
                x,
                y,
                selector,
            } => Ok(self.handle_ixyi(type_nibble, x as usize, y as usize, selector)),
            Instruction::Ixyn { x, y, n, .. } => self.draw(x as usize, y as usize, n),
        }
    }

    fn handle_iiii(&mut self, selector: u16) -> Result<Option<Advance>> {
        match selector {
            0x0E0 => self.video_ram.clear_screen(),
            // lands back on the call, and Next steps over it
            0x0EE => self.stack_return()?,
            _ => return Ok(None),
        }
        Ok(Some(Advance::Next))
    }

    fn handle_innn(&mut self, type_nibble: u8, nnn: u16) -> Option<Advance> {
        match type_nibble {
            0x1 => self.program_counter = nnn,
            0x2 => self.stack_call(nnn),
            0xA => {
                self.i_register = nnn;
                return Some(Advance::Next);
            }
            0xB => self.program_counter = nnn + self.v_registers[0] as u16,
            _ => return None,
        }
        Some(Advance::Stay)
    }

    fn handle_ixkk(&mut self, type_nibble: u8, x: usize, kk: u8) -> Option<Advance> {
        let vx = self.v_registers[x];
        match type_nibble {
            0x3 => return Some(Advance::skip_if(vx == kk)),
            0x4 => return Some(Advance::skip_if(vx != kk)),
            0x6 => self.v_registers[x] = kk,
            // no carry flag for this one
            0x7 => self.v_registers[x] = vx.wrapping_add(kk),
            0xC => self.v_registers[x] = self.rng.gen::<u8>() & kk,
            _ => return None,
        }
        Some(Advance::Next)
    }

    fn handle_ixyi(&mut self, type_nibble: u8, x: usize, y: usize, selector: u8) -> Option<Advance> {
        let (vx, vy) = (self.v_registers[x], self.v_registers[y]);
        match (type_nibble, selector) {
            (0x5, 0x0) => Some(Advance::skip_if(vx == vy)),
            (0x9, 0x0) => Some(Advance::skip_if(vx != vy)),
            (0x8, op) => self.handle_math(x, vx, vy, op).then(|| Advance::Next),
            _ => None,
        }
    }

    /// 8xy_ arithmetic. Both operands are read up front, so x == y and
    /// x == F behave; VF is always written last and wins over a result
    /// written to VF.
    fn handle_math(&mut self, x: usize, vx: u8, vy: u8, op: u8) -> bool {
        let v = &mut self.v_registers;
        match op {
            0x0 => v[x] = vy,
            0x1 => v[x] = vx | vy,
            0x2 => v[x] = vx & vy,
            0x3 => v[x] = vx ^ vy,
            0x4 => {
                let (sum, carry) = vx.overflowing_add(vy);
                v[x] = sum;
                v[VF] = carry as u8;
            }
            // subtraction clamps at zero rather than wrapping
            0x5 => {
                v[x] = vx.saturating_sub(vy);
                v[VF] = (vx >= vy) as u8;
            }
            0x6 => {
                v[x] = vy >> 1;
                v[VF] = vy & 1;
            }
            0x7 => {
                v[x] = vy.saturating_sub(vx);
                v[VF] = (vy >= vx) as u8;
            }
            0xE => {
                v[x] = vy << 1;
                v[VF] = (vy >> 7) & 1;
            }
            _ => return false,
        }
        true
    }

    fn handle_ixii(&mut self, type_nibble: u8, x: usize, selector: u8) -> Result<Option<Advance>> {
        let vx = self.v_registers[x];
        let i = self.i_register as usize;
        match (type_nibble, selector) {
            (0xE, 0x9E) => return Ok(Some(Advance::skip_if(self.pressed(vx)?))),
            (0xE, 0xA1) => return Ok(Some(Advance::skip_if(!self.pressed(vx)?))),
            (0xF, 0x07) => self.v_registers[x] = self.delay_timer.value,
            (0xF, 0x0A) => {
                log::debug!("waiting for a key press into V{:X}", x);
                self.waiting_register = Some(x);
                return Ok(Some(Advance::Stay));
            }
            (0xF, 0x15) => self.delay_timer.value = vx,
            (0xF, 0x18) => self.sound_timer.value = vx,
            (0xF, 0x1E) => self.i_register = self.i_register.wrapping_add(vx as u16),
            (0xF, 0x29) => {
                // I is 16 bits wide, like Fx1E it wraps
                let address = self.digits_memory_location as usize + vx as usize * self.digit_length;
                self.i_register = (address & 0xFFFF) as u16;
            }
            (0xF, 0x33) => self.memory.write(&[vx / 100, (vx / 10) % 10, vx % 10], i)?,
            (0xF, 0x55) => self.memory.write(&self.v_registers[..=x], i)?,
            (0xF, 0x65) => {
                let src = self.memory.get_ro_slice(i, x + 1)?;
                self.v_registers[..=x].copy_from_slice(src);
            }
            _ => return Ok(None),
        }
        Ok(Some(Advance::Next))
    }

    fn draw(&mut self, x: usize, y: usize, n: u8) -> Result<Option<Advance>> {
        let collision = self.video_ram.draw_sprite(
            self.v_registers[x] as usize,
            self.v_registers[y] as usize,
            self.memory.as_slice(),
            n as usize,
            self.i_register as usize,
        )?;
        self.v_registers[VF] = collision as u8;
        Ok(Some(Advance::Next))
    }
}
