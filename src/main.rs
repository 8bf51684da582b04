use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use spin_sleep::LoopHelper;

use chip8vm::display::{Display, MonoTermDisplay};
use chip8vm::input::{ControlButton, Input, KeyLatch, KeyMap, StdinInput};
use chip8vm::interpreter::{Breakpoint, Chip8Interpreter, Config};

/// frames a hex key stays down after the terminal last reported it
const KEY_HOLD_FRAMES: u32 = 6;

/// Run a CHIP-8 program in the terminal
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// ROM image to load at 0x200
    rom: PathBuf,

    /// start with execution paused (space resumes, i steps)
    #[arg(long)]
    start_paused: bool,

    /// sprites wrap around the screen edges instead of clipping
    #[arg(long)]
    wrap: bool,

    #[arg(long, default_value_t = 30)]
    fps: usize,

    #[arg(long, default_value_t = 20)]
    instructions_per_frame: usize,

    /// seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// pause when the program counter reaches this address (hex), may repeat
    #[arg(long = "break", value_parser = parse_address)]
    breakpoints: Vec<u16>,
}

fn parse_address(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("bad address {:?}: {}", s, e))
}

fn status_line(name: &str, paused: bool, sound: bool) -> String {
    let mut status = format!("CHIP-8: {}", name);
    if paused {
        status.push_str(" (PAUSED)");
    }
    if sound {
        status.push_str(" *BEEP*");
    }
    status
}

fn run(
    vm: &mut Chip8Interpreter,
    display: &mut impl Display,
    input: &mut impl Input,
    name: &str,
    mut paused: bool,
) -> Result<(), Box<dyn Error>> {
    let mut latch = KeyLatch::new(KEY_HOLD_FRAMES);
    let mut pacer = LoopHelper::builder().build_with_target_rate(vm.config().frames_per_second as f64);

    loop {
        pacer.loop_start();
        let controls = input.poll_controls()?;
        latch.update(vm, &controls)?;

        let mut step = false;
        for control in &controls {
            match control {
                ControlButton::Quit => return Ok(()),
                ControlButton::Pause => paused = !paused,
                ControlButton::Step => step = true,
                ControlButton::Hex(_) => {}
            }
        }

        let dt = vm.config().tick_length();
        if step {
            paused = true;
            vm.tick(dt)?;
        } else if !paused {
            for i in 0..vm.config().instructions_per_frame {
                // don't re-trigger the breakpoint we were resumed from
                if i > 0 {
                    if let Some(bp) = vm.breakpoint_hit() {
                        log::info!("hit {} at {:#x}", bp.name, bp.address);
                        paused = true;
                        break;
                    }
                }
                vm.tick(dt)?;
            }
        }

        let status = status_line(name, paused, vm.sound_timer() > 0);
        display.draw(vm.video_ram(), &status)?;
        pacer.loop_sleep();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let config = Config {
        display_wrap: args.wrap,
        frames_per_second: args.fps,
        instructions_per_frame: args.instructions_per_frame,
        rng_seed: args.seed,
        ..Config::default()
    };
    let mut vm = Chip8Interpreter::with_config(config)?;
    let mut f = File::open(&args.rom)?;
    let len = vm.load_rom(&mut f)?;
    log::info!("loaded {} bytes from {}", len, args.rom.display());
    for address in args.breakpoints {
        vm.add_breakpoint(Breakpoint::new(address, None));
    }

    let name = args
        .rom
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = {
        let mut display = MonoTermDisplay::new()?;
        let mut input = StdinInput::new(KeyMap::default())?;
        run(&mut vm, &mut display, &mut input, &name, args.start_paused)
        // input dropped here, leaving raw mode before anything is printed
    };

    // shove some junk on stdout to stop the cli messing up the last frame
    for _ in 0..(vm.config().display_height / 4 + 2) {
        println!();
    }

    if let Err(e) = result {
        log::error!("stopped: {}", e);
        eprintln!("error: {}", e);
        eprint!("{}", vm.dump_state());
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chip8vm::display::DummyDisplay;
    use chip8vm::input::DummyInput;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x2A0"), Ok(0x2A0));
        assert_eq!(parse_address("2a0"), Ok(0x2A0));
        assert!(parse_address("0xZZ").is_err());
    }

    #[test]
    fn test_status_line() {
        assert_eq!(status_line("pong.ch8", false, false), "CHIP-8: pong.ch8");
        assert_eq!(
            status_line("pong.ch8", true, true),
            "CHIP-8: pong.ch8 (PAUSED) *BEEP*"
        );
    }

    #[test]
    fn test_run_until_quit() -> Result<(), Box<dyn Error>> {
        let mut vm = Chip8Interpreter::new()?;
        // 00E0 then jump to self
        vm.load_rom(&mut &[0x00u8, 0xE0, 0x12, 0x02][..])?;
        let mut display = DummyDisplay::default();
        let mut input = DummyInput::new(vec![vec![], vec![], vec![ControlButton::Quit]]);
        run(&mut vm, &mut display, &mut input, "loop", false)?;
        assert_eq!(display.frames, 2);
        assert_eq!(vm.program_counter(), 0x202);
        Ok(())
    }

    #[test]
    fn test_breakpoint_pauses() -> Result<(), Box<dyn Error>> {
        let mut vm = Chip8Interpreter::new()?;
        // 6001, 6002, 6003, 1206
        vm.load_rom(&mut &[0x60u8, 0x01, 0x60, 0x02, 0x60, 0x03, 0x12, 0x06][..])?;
        vm.add_breakpoint(Breakpoint::new(0x202, None));
        let mut display = DummyDisplay::default();
        let mut input = DummyInput::new(vec![vec![], vec![ControlButton::Quit]]);
        run(&mut vm, &mut display, &mut input, "bp", false)?;
        assert_eq!(vm.program_counter(), 0x202);
        assert_eq!(vm.v_registers()[0], 1);
        assert!(display.status.ends_with("(PAUSED)"));
        Ok(())
    }

    #[test]
    fn test_step_while_paused() -> Result<(), Box<dyn Error>> {
        let mut vm = Chip8Interpreter::new()?;
        vm.load_rom(&mut &[0x60u8, 0x01, 0x61, 0x02][..])?;
        let mut display = DummyDisplay::default();
        let mut input = DummyInput::new(vec![
            vec![ControlButton::Step],
            vec![],
            vec![ControlButton::Quit],
        ]);
        run(&mut vm, &mut display, &mut input, "step", true)?;
        assert_eq!(vm.program_counter(), 0x202);
        assert_eq!(vm.v_registers()[..2], [1, 0]);
        Ok(())
    }
}
