// End-to-end interpreter scenarios, driven through a recording host
// wired like the console: the well-known syscalls plus `.s` on user
// id 3 and a deferred word-collecting syscall on user id 5.

use mforth::kernel::PAD_BASE;
use mforth::{Abort, Addr, Cell, ForthVm, Host, InputState, Syscall};

struct TestHost {
    out: String,
    seen_words: Vec<String>,
}

impl TestHost {
    fn new() -> TestHost {
        TestHost {
            out: String::new(),
            seen_words: Vec::new(),
        }
    }
}

impl Host for TestHost {
    fn sys(&mut self, vm: &mut ForthVm, id: Cell, input: Option<&str>) -> Result<InputState, Abort> {
        match Syscall::from_cell(id) {
            Some(Syscall::Emit) => {
                let c = vm.pop()? as u32;
                self.out.push(char::from_u32(c).unwrap_or('?'));
            }
            Some(Syscall::Print) => {
                let v = vm.pop()?;
                self.out.push_str(&format!("{v} "));
            }
            Some(Syscall::Type) => {
                let len = vm.pop()? as Addr;
                let addr = vm.pop()? as Addr;
                let text = vm.kernel.bytes(addr, len)?.to_vec();
                self.out.push_str(&String::from_utf8_lossy(&text));
            }
            Some(Syscall::Key) => {
                vm.push(107.0)?; // 'k'
            }
            Some(Syscall::User(3)) => {
                let depth = vm.dstack_count();
                self.out.push_str(&format!("<{depth}>"));
                for i in 0..depth {
                    self.out.push_str(&format!(" {}", vm.pick(i)?));
                }
            }
            Some(Syscall::User(5)) => {
                let Some(word) = input else {
                    return Ok(InputState::PassWord);
                };
                self.seen_words.push(word.to_string());
            }
            _ => {}
        }
        Ok(InputState::Interpret)
    }

    fn print(&mut self, text: &str) {
        self.out.push_str(text);
    }
}

fn forth() -> (ForthVm, TestHost) {
    let mut vm = ForthVm::new(false);
    vm.bootstrap().unwrap();
    (vm, TestHost::new())
}

#[test]
fn arithmetic_leaves_the_sum() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "1 2 +").unwrap();
    assert_eq!(vm.dstack_count(), 1);
    assert_eq!(vm.pop().unwrap(), 3.0);
}

#[test]
fn subtraction_and_division_order() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "10 4 -").unwrap();
    assert_eq!(vm.pop().unwrap(), 6.0);
    vm.eval(&mut host, "15 4 /").unwrap();
    assert_eq!(vm.pop().unwrap(), 3.75);
    vm.eval(&mut host, "7 2 mod").unwrap();
    assert_eq!(vm.pop().unwrap(), 1.0);
}

#[test]
fn comparison_and_bitwise() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "-1 <0 3 3 = 3 4 = 6 3 &").unwrap();
    assert_eq!(vm.pop().unwrap(), 2.0);
    assert_eq!(vm.pop().unwrap(), 0.0);
    assert_eq!(vm.pop().unwrap(), 1.0);
    assert_eq!(vm.pop().unwrap(), 1.0);
}

#[test]
fn colon_definition_executes() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": sq dup * ; 5 sq").unwrap();
    assert_eq!(vm.dstack_count(), 1);
    assert_eq!(vm.pop().unwrap(), 25.0);
}

#[test]
fn words_call_words() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": a 1 ; : b a a + ; b").unwrap();
    assert_eq!(vm.pop().unwrap(), 2.0);
}

#[test]
fn division_by_zero_aborts_and_clears() {
    let (mut vm, mut host) = forth();
    assert_eq!(vm.eval(&mut host, "10 0 /"), Err(Abort::DivisionByZero));
    assert_eq!(vm.dstack_count(), 0);
    assert_eq!(vm.rstack_count(), 0);
}

#[test]
fn unknown_word_mid_line_aborts_and_clears() {
    let (mut vm, mut host) = forth();
    assert_eq!(vm.eval(&mut host, "1 2 xyzzy"), Err(Abort::NotAWord));
    assert_eq!(vm.dstack_count(), 0);
}

#[test]
fn out_of_range_fetch_aborts() {
    let (mut vm, mut host) = forth();
    assert_eq!(vm.eval(&mut host, "1000000 1 @@"), Err(Abort::OutsideMem));
    assert_eq!(vm.dstack_count(), 0);
}

#[test]
fn dot_s_prints_depth_and_cells_top_first() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": .s 131 sys ; : f 1 2 3 ; f .s").unwrap();
    assert_eq!(host.out, "<3> 3 2 1");
    assert_eq!(vm.dstack_count(), 3);
}

#[test]
fn string_literal_types_its_text() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": type 2 sys ; s\" hello\" type").unwrap();
    assert_eq!(host.out, "hello");
    assert_eq!(vm.dstack_count(), 0);
}

#[test]
fn compiled_string_literal_survives_in_the_body() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": greet s\" hi\" ;").unwrap();
    vm.eval(&mut host, "greet").unwrap();
    let len = vm.pop().unwrap() as Addr;
    let addr = vm.pop().unwrap() as Addr;
    assert_eq!(len, 2);
    assert_eq!(vm.kernel.bytes(addr, len).unwrap(), b"hi");
}

#[test]
fn escaped_quote_stays_in_the_string() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "\"a\\\"b\"").unwrap();
    let len = vm.pop().unwrap() as Addr;
    let addr = vm.pop().unwrap() as Addr;
    assert_eq!(vm.kernel.bytes(addr, len).unwrap(), b"a\\\"b");
}

#[test]
fn emit_and_print_reach_the_host() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": emit 0 sys ; : . 1 sys ; 104 emit 105 emit 3 .")
        .unwrap();
    assert_eq!(host.out, "hi3 ");
}

#[test]
fn key_pushes_the_hosts_character() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": key 3 sys ; key").unwrap();
    assert_eq!(vm.pop().unwrap(), 107.0);
}

#[test]
fn deferred_syscall_resumes_with_the_word() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": grab 133 sys ; grab hello").unwrap();
    assert_eq!(host.seen_words, vec!["hello".to_string()]);
    assert_eq!(vm.dstack_count(), 0);
}

#[test]
fn tick_execute_matches_direct_call() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": w 7 ;").unwrap();
    vm.eval(&mut host, "w").unwrap();
    let direct = vm.pop().unwrap();
    vm.eval(&mut host, "' w execute").unwrap();
    assert_eq!(vm.pop().unwrap(), direct);
    assert_eq!(vm.dstack_count(), 0);
}

#[test]
fn tick_unknown_word_aborts() {
    let (mut vm, mut host) = forth();
    assert_eq!(vm.eval(&mut host, "' nope"), Err(Abort::NotAWord));
}

#[test]
fn compile_time_tick_captures_an_xt() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": w 7 ; : t ['] w execute ; t").unwrap();
    assert_eq!(vm.pop().unwrap(), 7.0);
}

#[test]
fn comments_are_skipped() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "( this text is ignored ) 5").unwrap();
    assert_eq!(vm.pop().unwrap(), 5.0);
    vm.eval(&mut host, "\\ junk to end of line\n7").unwrap();
    assert_eq!(vm.pop().unwrap(), 7.0);
    assert_eq!(vm.dstack_count(), 0);
}

#[test]
fn char_pushes_the_first_byte() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "char A char abc").unwrap();
    assert_eq!(vm.pop().unwrap(), 97.0);
    assert_eq!(vm.pop().unwrap(), 65.0);
}

#[test]
fn begin_while_repeat_built_from_jumps() {
    let (mut vm, mut host) = forth();
    let prelude = "\
        : here h 0 @@ ; \
        : begin here ; immediate \
        : while 29 0 ,, here 999 0 ,, ; immediate \
        : repeat 28 0 ,, swap 0 ,, here swap 0 !! ; immediate ";
    vm.eval(&mut host, prelude).unwrap();
    vm.eval(&mut host, ": r 0 begin dup 5 - <0 while dup 1 + repeat ;")
        .unwrap();
    vm.eval(&mut host, "r").unwrap();
    assert_eq!(vm.dstack_count(), 6);
    for expected in (0..=5).rev() {
        assert_eq!(vm.pop().unwrap(), expected as Cell);
    }
}

#[test]
fn uservars_are_fetchable_and_storable() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "h 0 @@").unwrap();
    let here = vm.pop().unwrap();
    assert!(here > 32.0);
    vm.eval(&mut host, "1 _postpone 0 !! _postpone 0 @@").unwrap();
    assert_eq!(vm.pop().unwrap(), 1.0);
    vm.eval(&mut host, "0 _postpone 0 !!").unwrap();
}

#[test]
fn typed_store_and_fetch_through_the_pad() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "42 8200 2 !! 8200 2 @@").unwrap();
    assert_eq!(vm.pop().unwrap(), 42.0);
    vm.eval(&mut host, "300 8300 0 !! 8300 0 @@ 8300 0 ##").unwrap();
    assert_eq!(vm.pop().unwrap(), 2.0);
    assert_eq!(vm.pop().unwrap(), 300.0);
}

#[test]
fn invalid_size_tags_abort() {
    let (mut vm, mut host) = forth();
    assert_eq!(vm.eval(&mut host, "1 8200 9 !!"), Err(Abort::InvalidSize));
    assert_eq!(vm.eval(&mut host, "8200 99 @@"), Err(Abort::InvalidSize));
}

#[test]
fn comma_appends_at_here() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "h 0 @@ 300 0 ,, h 0 @@ swap -").unwrap();
    assert_eq!(vm.pop().unwrap(), 2.0);
}

#[test]
fn cells_scales_by_the_worst_case_stride() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "3 cells").unwrap();
    assert_eq!(vm.pop().unwrap(), 27.0);
}

#[test]
fn alloc_hands_out_pad_space_and_wraps() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "5 alloc").unwrap();
    assert_eq!(vm.pop().unwrap(), PAD_BASE as Cell);
    vm.eval(&mut host, "900 alloc drop 900 alloc").unwrap();
    assert_eq!(vm.pop().unwrap(), PAD_BASE as Cell);
}

#[test]
fn cmove_copies_a_region() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "\"abcdef\" 9000 swap cmove").unwrap();
    assert_eq!(vm.dstack_count(), 0);
    assert_eq!(&vm.dump()[9000..9006], b"abcdef");
}

#[test]
fn compare_orders_regions() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "\"abc\" \"abd\" compare").unwrap();
    assert_eq!(vm.pop().unwrap(), 1.0);
    vm.eval(&mut host, "\"abc\" \"abc\" compare").unwrap();
    assert_eq!(vm.pop().unwrap(), 0.0);
    vm.eval(&mut host, "\"abc\" \"ab\" compare").unwrap();
    assert_eq!(vm.pop().unwrap(), -1.0);
}

#[test]
fn search_finds_one_based_positions() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "\"hello world\" \"world\" search").unwrap();
    assert_eq!(vm.pop().unwrap(), 7.0);
    vm.eval(&mut host, "\"hello world\" \"zip\" search").unwrap();
    assert_eq!(vm.pop().unwrap(), 0.0);
}

#[test]
fn atoi_and_atof_parse_regions() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "\"42abc\" atoi").unwrap();
    assert_eq!(vm.pop().unwrap(), 42.0);
    vm.eval(&mut host, "\"3.5x\" atof").unwrap();
    assert_eq!(vm.pop().unwrap(), 3.5);
}

#[test]
fn word_collects_to_a_delimiter() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "58 word xyz:").unwrap();
    let addr = vm.pop().unwrap() as Addr;
    assert_eq!(vm.dstack_count(), 0);
    assert_eq!(vm.kernel.bytes(addr, 4).unwrap(), b"xyz\0");
}

#[test]
fn return_stack_primitives() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": t 5 >r 0 pickr r> drop ; t").unwrap();
    assert_eq!(vm.pop().unwrap(), 5.0);
    assert_eq!(vm.rstack_count(), 0);
}

#[test]
fn stack_shuffles() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "1 2 3 rot").unwrap();
    assert_eq!(vm.pop().unwrap(), 1.0);
    assert_eq!(vm.pop().unwrap(), 3.0);
    assert_eq!(vm.pop().unwrap(), 2.0);

    vm.eval(&mut host, "1 2 tuck").unwrap();
    assert_eq!(vm.pop().unwrap(), 2.0);
    assert_eq!(vm.pop().unwrap(), 1.0);
    assert_eq!(vm.pop().unwrap(), 2.0);

    vm.eval(&mut host, "1 2 3 4 2swap").unwrap();
    assert_eq!(vm.pop().unwrap(), 2.0);
    assert_eq!(vm.pop().unwrap(), 1.0);
    assert_eq!(vm.pop().unwrap(), 4.0);
    assert_eq!(vm.pop().unwrap(), 3.0);

    vm.eval(&mut host, "1 2 3 4 2over").unwrap();
    assert_eq!(vm.dstack_count(), 6);
    assert_eq!(vm.pop().unwrap(), 2.0);
    assert_eq!(vm.pop().unwrap(), 1.0);

    vm.eval(&mut host, "10 20 30 1 pick").unwrap();
    assert_eq!(vm.dstack_count(), 4);
    assert_eq!(vm.pop().unwrap(), 20.0);
}

#[test]
fn create_reserves_a_data_field() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "create buf buf").unwrap();
    let data = vm.pop().unwrap() as Addr;
    // the data field sits right after the compiled body
    assert_eq!(data, vm.kernel.here());
    vm.eval(&mut host, &format!("9 {data} 2 !! {data} 2 @@")).unwrap();
    assert_eq!(vm.pop().unwrap(), 9.0);
}

#[test]
fn forget_rewinds_everything_defined_after() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": one 1 ; : two 2 ;").unwrap();
    vm.eval(&mut host, "forget one").unwrap();
    assert_eq!(vm.eval(&mut host, "one"), Err(Abort::NotAWord));
    assert_eq!(vm.eval(&mut host, "two"), Err(Abort::NotAWord));
}

#[test]
fn definition_matches_inline_body() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": body dup * 1 + ;").unwrap();
    vm.eval(&mut host, "7 body").unwrap();
    let defined = vm.pop().unwrap();
    vm.eval(&mut host, "7 dup * 1 +").unwrap();
    assert_eq!(vm.pop().unwrap(), defined);
}

#[test]
fn words_listing_matches_the_visible_set() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, "words").unwrap();
    let printed: Vec<&str> = host.out.split_whitespace().collect();
    let listed = vm.words_list("", false).unwrap();
    assert_eq!(printed.len(), listed.len());
    assert!(printed.contains(&"dup"));
    assert!(!printed.contains(&",,"));
    // 55 primitives, 6 of them hidden, plus 8 user variables
    assert_eq!(listed.len(), 57);
}

#[test]
fn image_save_and_load_restores_definitions() {
    let (mut vm, mut host) = forth();
    vm.eval(&mut host, ": answer 42 ;").unwrap();
    let image = vm.dump().to_vec();

    let mut vm2 = ForthVm::new(false);
    vm2.dump_mut().copy_from_slice(&image);
    vm2.eval(&mut host, "answer").unwrap();
    assert_eq!(vm2.pop().unwrap(), 42.0);
    // free memory accounting carried over with HERE
    assert_eq!(vm.free_mem(), vm2.free_mem());
}
