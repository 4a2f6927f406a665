/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use impc::codegen::instruction::{Instr, Register};
use impc::codegen::{GenOutput, Severity};
use impc::compile;
use impc::file_reader::{FileReader, MockFileReader, SourceFileReader};
use impc::render;
use std::collections::HashMap;
use std::path::Path;

// ------------- reference virtual machine -------------

// Executes an emitted stream against input/output vectors. Registers and
// cells hold unsigned integers, SUB and DEC floor at zero, uninitialized
// cells read as zero.
fn run(code: &[Instr], input: &[u64]) -> Vec<u64> {
    let mut registers = [0u64; 8];
    let mut memory: HashMap<u64, u64> = HashMap::new();
    let mut input = input.iter().copied();
    let mut output = Vec::new();
    let mut pc = 0usize;
    let mut steps = 0u64;

    while pc < code.len() {
        steps += 1;
        assert!(steps < 1_000_000, "emitted program does not terminate");
        match code[pc] {
            Instr::Get(r) => registers[0] = registers[r as usize],
            Instr::Put(r) => registers[r as usize] = registers[0],
            Instr::Load(r) => {
                registers[0] = memory.get(&registers[r as usize]).copied().unwrap_or(0)
            }
            Instr::Store(r) => {
                memory.insert(registers[r as usize], registers[0]);
            }
            Instr::Add(r) => registers[0] = registers[0] + registers[r as usize],
            Instr::Sub(r) => registers[0] = registers[0].saturating_sub(registers[r as usize]),
            Instr::Rst(r) => registers[r as usize] = 0,
            Instr::Inc(r) => registers[r as usize] += 1,
            Instr::Dec(r) => registers[r as usize] = registers[r as usize].saturating_sub(1),
            Instr::Shl(r) => registers[r as usize] *= 2,
            Instr::Shr(r) => registers[r as usize] /= 2,
            Instr::Read => registers[0] = input.next().expect("program read past provided input"),
            Instr::Write => output.push(registers[0]),
            Instr::Jump(k) => {
                pc = k;
                continue;
            }
            Instr::Jpos(k) => {
                if registers[0] > 0 {
                    pc = k;
                    continue;
                }
            }
            Instr::Jzero(k) => {
                if registers[0] == 0 {
                    pc = k;
                    continue;
                }
            }
            Instr::Jumpr(r) => {
                pc = registers[r as usize] as usize;
                continue;
            }
            Instr::Strk(r) => registers[r as usize] = pc as u64,
            Instr::Halt => break,
        }
        pc += 1;
    }
    output
}

fn compile_source(source: &str) -> GenOutput {
    let mut reader = MockFileReader::default();
    reader.add_file("test.imp", source);
    compile(Path::new("test.imp"), &reader).unwrap()
}

fn compile_clean(source: &str) -> Vec<Instr> {
    let result = compile_source(source);
    assert!(
        !result.error_mode,
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );
    result.code
}

fn error_messages(result: &GenOutput) -> Vec<&str> {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.as_str())
        .collect()
}

// ------------- observable behavior -------------

#[test]
fn test_read_write_echo() {
    let code = compile_clean("PROGRAM IS a IN READ a; WRITE a; END\n");
    assert_eq!(run(&code, &[7]), vec![7]);
}

#[test]
fn test_increment_uses_peephole() {
    let code = compile_clean("PROGRAM IS a, b IN READ a; b := a + 1; WRITE b; END\n");
    assert!(code.contains(&Instr::Inc(Register::A)));
    assert_eq!(run(&code, &[41]), vec![42]);
}

#[test]
fn test_literal_product_folds() {
    let code = compile_clean("PROGRAM IS a IN a := 6 * 7; WRITE a; END\n");
    // a pair of literals folds away, nothing to branch over
    assert!(
        code.iter()
            .all(|i| !matches!(i, Instr::Jpos(_) | Instr::Jzero(_)))
    );
    assert_eq!(run(&code, &[]), vec![42]);
}

#[test]
fn test_runtime_multiplication() {
    let code =
        compile_clean("PROGRAM IS a, b, c IN READ a; READ b; c := a * b; WRITE c; END\n");
    assert_eq!(run(&code, &[6, 7]), vec![42]);
    assert_eq!(run(&code, &[1000, 0]), vec![0]);
    assert_eq!(run(&code, &[0, 1000]), vec![0]);
    assert_eq!(run(&code, &[31, 33]), vec![1023]);
}

#[test]
fn test_write_five_exact_stream() {
    let result = compile_source("PROGRAM IS IN WRITE 5; END\n");
    assert!(!result.error_mode);
    assert_eq!(
        result.code,
        vec![
            Instr::Rst(Register::A),
            Instr::Inc(Register::A),
            Instr::Shl(Register::A),
            Instr::Shl(Register::A),
            Instr::Inc(Register::A),
            Instr::Write,
            Instr::Halt,
        ]
    );
    assert_eq!(
        render(&result.code),
        "RST a\nINC a\nSHL a\nSHL a\nINC a\nWRITE\nHALT\n"
    );
}

#[test]
fn test_array_literal_indices() {
    let code = compile_clean(
        "PROGRAM IS t[3] IN t[0] := 1; t[1] := 2; t[2] := 3; WRITE t[2]; END\n",
    );
    assert_eq!(run(&code, &[]), vec![3]);
}

#[test]
fn test_array_variable_index() {
    let code = compile_clean(
        "PROGRAM IS t[3], i IN t[0] := 10; t[1] := 20; t[2] := 30; READ i; WRITE t[i]; END\n",
    );
    assert_eq!(run(&code, &[0]), vec![10]);
    assert_eq!(run(&code, &[2]), vec![30]);
}

#[test]
fn test_procedure_scalar_forwarding() {
    let source = "\
PROCEDURE boost(a) IS IN a := a + 1; END
PROGRAM IS x IN x := 10; boost(x); WRITE x; END
";
    let code = compile_clean(source);
    assert!(code.contains(&Instr::Strk(Register::A)));
    assert!(code.contains(&Instr::Jumpr(Register::A)));
    assert_eq!(run(&code, &[]), vec![11]);
}

#[test]
fn test_procedure_called_twice() {
    let source = "\
PROCEDURE double(x) IS y IN y := x * 2; x := y; END
PROGRAM IS v IN v := 3; double(v); double(v); WRITE v; END
";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[]), vec![12]);
}

#[test]
fn test_procedure_array_parameter() {
    let source = "\
PROCEDURE fill(T t, v) IS IN t[0] := v; t[1] := v; END
PROGRAM IS w[2], x IN x := 9; fill(w, x); WRITE w[0]; WRITE w[1]; END
";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[]), vec![9, 9]);
}

#[test]
fn test_procedure_array_with_pointer_index() {
    let source = "\
PROCEDURE pick(T t, i) IS IN WRITE t[i]; END
PROGRAM IS w[3], j IN w[0] := 5; w[1] := 6; w[2] := 7; j := 2; pick(w, j); END
";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[]), vec![7]);
}

#[test]
fn test_argument_forwarded_through_procedures() {
    // relay passes its own pointer parameters along to another procedure
    let source = "\
PROCEDURE bump(a) IS IN a := a + 1; END
PROCEDURE relay(b) IS IN bump(b); bump(b); END
PROGRAM IS v IN v := 5; relay(v); WRITE v; END
";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[]), vec![7]);
}

#[test]
fn test_all_relations_on_the_machine() {
    let cases: [(&str, fn(u64, u64) -> bool); 6] = [
        ("=", |a, b| a == b),
        ("!=", |a, b| a != b),
        (">", |a, b| a > b),
        ("<", |a, b| a < b),
        (">=", |a, b| a >= b),
        ("<=", |a, b| a <= b),
    ];
    for (op, holds) in cases {
        let source = format!(
            "PROGRAM IS a, b IN READ a; READ b; IF a {} b THEN WRITE 1; ELSE WRITE 0; ENDIF END\n",
            op
        );
        let code = compile_clean(&source);
        for (a, b) in [(0, 0), (0, 1), (1, 0), (2, 2), (3, 1), (1, 3)] {
            let expected = if holds(a, b) { 1 } else { 0 };
            assert_eq!(
                run(&code, &[a, b]),
                vec![expected],
                "a {} b with a={}, b={}",
                op,
                a,
                b
            );
        }
    }
}

#[test]
fn test_if_without_else() {
    let code =
        compile_clean("PROGRAM IS a IN READ a; IF a <= 3 THEN WRITE a; ENDIF WRITE 0; END\n");
    assert_eq!(run(&code, &[2]), vec![2, 0]);
    assert_eq!(run(&code, &[5]), vec![0]);
}

#[test]
fn test_while_sum() {
    let source = "\
PROGRAM IS n, s IN
  READ n;
  s := 0;
  WHILE n > 0 DO s := s + n; n := n - 1; ENDWHILE
  WRITE s;
END
";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[5]), vec![15]);
    assert_eq!(run(&code, &[0]), vec![0]);
}

#[test]
fn test_while_with_swapped_condition() {
    // >= canonicalizes with a swap, so the comparison's own jump is the exit
    let source = "\
PROGRAM IS n IN READ n; WHILE n >= 1 DO WRITE n; n := n - 1; ENDWHILE END\n";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[3]), vec![3, 2, 1]);
    assert_eq!(run(&code, &[0]), Vec::<u64>::new());
}

#[test]
fn test_while_not_equal() {
    let source =
        "PROGRAM IS n IN READ n; WHILE n != 0 DO WRITE n; n := n - 1; ENDWHILE END\n";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[2]), vec![2, 1]);
}

#[test]
fn test_repeat_until() {
    let source =
        "PROGRAM IS n IN n := 0; REPEAT n := n + 1; WRITE n; UNTIL n = 3; END\n";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[]), vec![1, 2, 3]);
}

#[test]
fn test_repeat_until_swapped() {
    // the body always runs once; n != 3 already holds after it
    let source =
        "PROGRAM IS n IN n := 0; REPEAT n := n + 1; WRITE n; UNTIL n != 3; END\n";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[]), vec![1]);
}

#[test]
fn test_division_and_modulo() {
    let source = "\
PROGRAM IS a, b, q, r IN
  READ a; READ b;
  q := a / b;
  r := a % b;
  WRITE q; WRITE r;
END
";
    let code = compile_clean(source);
    assert_eq!(run(&code, &[43, 7]), vec![6, 1]);
    assert_eq!(run(&code, &[42, 7]), vec![6, 0]);
    assert_eq!(run(&code, &[5, 9]), vec![0, 5]);
    // runtime division by zero: quotient 0, remainder is the dividend
    assert_eq!(run(&code, &[7, 0]), vec![0, 7]);
}

#[test]
fn test_saturating_subtraction() {
    let code = compile_clean(
        "PROGRAM IS a, b, c IN READ a; READ b; c := a - b; WRITE c; END\n",
    );
    assert_eq!(run(&code, &[3, 5]), vec![0]);
    assert_eq!(run(&code, &[5, 3]), vec![2]);
}

#[test]
fn test_literal_folds_match_machine_semantics() {
    let code = compile_clean(
        "PROGRAM IS a IN a := 3 - 5; WRITE a; a := 7 / 2; WRITE a; a := 7 % 2; WRITE a; END\n",
    );
    assert_eq!(run(&code, &[]), vec![0, 3, 1]);
}

// ------------- diagnostics -------------

#[test]
fn test_redeclaration_is_an_error() {
    let result = compile_source("PROGRAM IS a, a IN a := 1; END\n");
    assert!(result.error_mode);
    assert_eq!(error_messages(&result), vec!["variable a already declared"]);
}

#[test]
fn test_zero_size_array_is_an_error() {
    let result = compile_source("PROGRAM IS t[0] IN WRITE 1; END\n");
    assert!(result.error_mode);
    assert_eq!(
        error_messages(&result),
        vec!["array t cannot be declared with size 0"]
    );
}

#[test]
fn test_literal_index_out_of_bounds() {
    let result = compile_source("PROGRAM IS t[3] IN t[3] := 1; END\n");
    assert!(result.error_mode);
    assert_eq!(
        error_messages(&result),
        vec!["index 3 is out of bounds for array t"]
    );
}

#[test]
fn test_undeclared_name() {
    let result = compile_source("PROGRAM IS IN WRITE x; END\n");
    assert!(result.error_mode);
    assert_eq!(error_messages(&result), vec!["x is undeclared"]);
}

#[test]
fn test_array_used_as_scalar() {
    let result = compile_source("PROGRAM IS t[2] IN t := 1; END\n");
    assert!(result.error_mode);
    assert_eq!(error_messages(&result), vec!["t is an array"]);
}

#[test]
fn test_scalar_used_as_array() {
    let result = compile_source("PROGRAM IS x IN x[0] := 1; END\n");
    assert!(result.error_mode);
    assert_eq!(error_messages(&result), vec!["x is not an array"]);
}

#[test]
fn test_uninitialized_read_is_an_error() {
    let result = compile_source("PROGRAM IS a, b IN b := a + 1; WRITE b; END\n");
    assert!(result.error_mode);
    assert_eq!(error_messages(&result), vec!["variable a not initialized"]);
    assert_eq!(result.diagnostics[0].line, 1);
}

#[test]
fn test_uninitialized_write_is_an_error() {
    let result = compile_source("PROGRAM IS a IN WRITE a; END\n");
    assert!(result.error_mode);
    assert_eq!(error_messages(&result), vec!["variable a not initialized"]);
}

#[test]
fn test_uninitialized_in_loop_is_a_warning() {
    let source = "\
PROGRAM IS a, n IN
  n := 0;
  WHILE n < 1 DO a := a + 1; n := n + 1; ENDWHILE
  WRITE a;
END
";
    let result = compile_source(source);
    assert!(!result.error_mode);
    let warnings: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "variable a may be not initialized");
    assert_eq!(warnings[0].line, 3);
    // backward flow supplies the value; cells start at zero on the machine
    assert_eq!(run(&result.code, &[]), vec![1]);
}

#[test]
fn test_unknown_procedure_call() {
    let result = compile_source("PROGRAM IS x IN x := 1; foo(x); END\n");
    assert!(result.error_mode);
    assert_eq!(
        error_messages(&result),
        vec!["procedure foo not declared (this may mean that recursive call was issued)"]
    );
}

#[test]
fn test_recursive_call_is_reported() {
    let source = "\
PROCEDURE rec(x) IS IN rec(x); END
PROGRAM IS v IN v := 1; rec(v); END
";
    let result = compile_source(source);
    assert!(result.error_mode);
    assert_eq!(
        error_messages(&result),
        vec!["procedure rec not declared (this may mean that recursive call was issued)"]
    );
    assert_eq!(result.diagnostics[0].line, 1);
}

#[test]
fn test_arity_mismatch() {
    let source = "\
PROCEDURE two(x, y) IS IN x := y; END
PROGRAM IS v IN v := 1; two(v); END
";
    let result = compile_source(source);
    assert!(result.error_mode);
    assert_eq!(
        error_messages(&result),
        vec!["argument count mismatch with procedure two (received: 1, expected: 2)"]
    );
}

#[test]
fn test_argument_kind_mismatch() {
    let source = "\
PROCEDURE arr(T t) IS IN t[0] := 1; END
PROGRAM IS v IN v := 1; arr(v); END
";
    let result = compile_source(source);
    assert!(result.error_mode);
    assert_eq!(
        error_messages(&result),
        vec!["argument type mismatch with procedure arr"]
    );
}

#[test]
fn test_duplicate_procedure() {
    let source = "\
PROCEDURE p(x) IS IN x := 1; END
PROCEDURE p(x) IS IN x := 2; END
PROGRAM IS v IN p(v); WRITE v; END
";
    let result = compile_source(source);
    assert!(result.error_mode);
    assert_eq!(error_messages(&result), vec!["procedure p already declared"]);
}

#[test]
fn test_constant_division_by_zero() {
    let result = compile_source("PROGRAM IS x IN x := 1 / 0; END\n");
    assert!(result.error_mode);
    assert_eq!(
        error_messages(&result),
        vec!["division by zero in constant expression"]
    );
}

#[test]
fn test_emission_continues_after_an_error() {
    let source = "\
PROGRAM IS a IN
  WRITE b;
  WRITE c;
  a := 1;
END
";
    let result = compile_source(source);
    assert!(result.error_mode);
    assert_eq!(
        error_messages(&result),
        vec!["b is undeclared", "c is undeclared"]
    );
    assert_eq!(result.diagnostics[0].line, 2);
    assert_eq!(result.diagnostics[1].line, 3);
}

// ------------- structural properties -------------

#[test]
fn test_branch_target_integrity() {
    let sources = [
        "PROGRAM IS a IN READ a; WRITE a; END\n",
        "PROGRAM IS a, b IN READ a; b := a + 1; WRITE b; END\n",
        "PROGRAM IS n, s IN READ n; s := 0; WHILE n > 0 DO s := s + n; n := n - 1; ENDWHILE WRITE s; END\n",
        "PROGRAM IS n IN n := 0; REPEAT n := n + 1; UNTIL n >= 5; WRITE n; END\n",
        "PROGRAM IS a, b IN READ a; READ b; IF a < b THEN WRITE a; ELSE WRITE b; ENDIF END\n",
        "PROGRAM IS a, b, c IN READ a; READ b; c := a / b; WRITE c; END\n",
        "PROCEDURE boost(a) IS IN a := a + 1; END\nPROGRAM IS x IN x := 10; boost(x); WRITE x; END\n",
        "PROGRAM IS t[3] IN t[4] := 1; END\n",
    ];
    for source in sources {
        let result = compile_source(source);
        for (at, instr) in result.code.iter().enumerate() {
            if let Instr::Jump(k) | Instr::Jpos(k) | Instr::Jzero(k) = instr {
                assert!(
                    *k <= result.code.len(),
                    "{:?} at {} escapes a stream of {} instructions ({})",
                    instr,
                    at,
                    result.code.len(),
                    source.lines().next().unwrap()
                );
            }
        }
    }
}

#[test]
fn test_leading_jump_skips_procedures() {
    let source = "\
PROCEDURE boost(a) IS IN a := a + 1; END
PROGRAM IS x IN x := 1; WRITE x; END
";
    let result = compile_source(source);
    assert!(!result.error_mode);
    match result.code[0] {
        Instr::Jump(target) => {
            // the jump lands past every procedure body, on the main entry
            assert!(target > 1);
            assert!(target < result.code.len());
        }
        other => panic!("expected a leading JUMP, got {}", other),
    }
    // a program that never calls the procedure still runs straight through
    assert_eq!(run(&result.code, &[]), vec![1]);
}

// ------------- file plumbing -------------

#[test]
fn test_compile_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("program.imp");
    std::fs::write(
        &source_path,
        "PROGRAM IS a IN a := 2 + 2; WRITE a; END\n",
    )
    .unwrap();

    let reader = SourceFileReader;
    let result = compile(&source_path, &reader).unwrap();
    assert!(!result.error_mode);

    let output_path = dir.path().join("program.mr");
    std::fs::write(&output_path, render(&result.code)).unwrap();
    let written = std::fs::read_to_string(&output_path).unwrap();
    assert!(written.lines().count() > 2);
    assert_eq!(written.lines().last().unwrap(), "HALT");
}

#[test]
fn test_missing_input_file() {
    let reader = MockFileReader::default();
    assert!(compile(Path::new("absent.imp"), &reader).is_err());
}

#[test]
fn test_reader_trait_object_compatible() {
    // the CLI hands the production reader through the same trait
    fn read_via<F: FileReader>(reader: &F, path: &Path) -> bool {
        reader.read_to_string(path).is_ok()
    }
    let mut reader = MockFileReader::default();
    reader.add_file("x.imp", "PROGRAM IS IN WRITE 1; END\n");
    assert!(read_via(&reader, Path::new("x.imp")));
    assert!(!read_via(&reader, Path::new("y.imp")));
}
