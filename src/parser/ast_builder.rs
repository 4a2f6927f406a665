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

use crate::ast::*;
use crate::errors::CompileError;
use crate::parser::Rule;
use anyhow::Result;
use pest::iterators::Pair;

fn line_of(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}

pub fn build_procedure(pair: Pair<Rule>) -> Result<ProcDef> {
    let mut inner = pair.into_inner();
    let head = build_proc_head(inner.next().unwrap())?;

    let mut declarations = Vec::new();
    let mut commands = Vec::new();
    for pair in inner {
        match pair.as_rule() {
            Rule::declarations => declarations = build_declarations(pair)?,
            Rule::commands => commands = build_commands(pair)?,
            _ => unreachable!("Unknown procedure rule: {:?}", pair.as_rule()),
        }
    }

    Ok(ProcDef {
        head,
        declarations,
        commands,
    })
}

pub fn build_main(pair: Pair<Rule>) -> Result<MainBlock> {
    let mut declarations = Vec::new();
    let mut commands = Vec::new();
    for pair in pair.into_inner() {
        match pair.as_rule() {
            Rule::declarations => declarations = build_declarations(pair)?,
            Rule::commands => commands = build_commands(pair)?,
            _ => unreachable!("Unknown main rule: {:?}", pair.as_rule()),
        }
    }

    Ok(MainBlock {
        declarations,
        commands,
    })
}

fn build_proc_head(pair: Pair<Rule>) -> Result<ProcHead> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_string();

    let mut params = Vec::new();
    for param in inner.next().unwrap().into_inner() {
        let param = param.into_inner().next().unwrap();
        let kind = match param.as_rule() {
            Rule::array_param => ParamKind::Array,
            Rule::scalar_param => ParamKind::Scalar,
            _ => unreachable!("Unknown parameter rule: {:?}", param.as_rule()),
        };
        let name = param.into_inner().next().unwrap().as_str().to_string();
        params.push(Param { kind, name });
    }

    Ok(ProcHead { name, params, line })
}

fn build_declarations(pair: Pair<Rule>) -> Result<Vec<Declaration>> {
    let mut declarations = Vec::new();
    for pair in pair.into_inner() {
        let line = line_of(&pair);
        let decl = pair.into_inner().next().unwrap();
        match decl.as_rule() {
            Rule::scalar_decl => {
                let name = decl.into_inner().next().unwrap().as_str().to_string();
                declarations.push(Declaration::Scalar { name, line });
            }
            Rule::array_decl => {
                let mut inner = decl.into_inner();
                let name = inner.next().unwrap().as_str().to_string();
                let size = build_num(inner.next().unwrap())?;
                declarations.push(Declaration::Array { name, size, line });
            }
            _ => unreachable!("Unknown declaration rule: {:?}", decl.as_rule()),
        }
    }
    Ok(declarations)
}

fn build_commands(pair: Pair<Rule>) -> Result<Vec<Command>> {
    pair.into_inner()
        .map(|pair| build_command(pair.into_inner().next().unwrap()))
        .collect()
}

fn build_command(pair: Pair<Rule>) -> Result<Command> {
    let line = line_of(&pair);
    match pair.as_rule() {
        Rule::assign => {
            let mut inner = pair.into_inner();
            let target = build_identifier(inner.next().unwrap())?;
            let value = build_expression(inner.next().unwrap())?;
            Ok(Command::Assign {
                target,
                value,
                line,
            })
        }
        Rule::ifelse => {
            let mut inner = pair.into_inner();
            let condition = build_condition(inner.next().unwrap())?;
            let then_branch = build_commands(inner.next().unwrap())?;
            let else_branch = match inner.next() {
                Some(branch) => build_commands(branch.into_inner().next().unwrap())?,
                None => Vec::new(),
            };
            Ok(Command::IfElse {
                condition,
                then_branch,
                else_branch,
            })
        }
        Rule::while_loop => {
            let mut inner = pair.into_inner();
            let condition = build_condition(inner.next().unwrap())?;
            let body = build_commands(inner.next().unwrap())?;
            Ok(Command::While { condition, body })
        }
        Rule::repeat_loop => {
            let mut inner = pair.into_inner();
            let body = build_commands(inner.next().unwrap())?;
            let condition = build_condition(inner.next().unwrap())?;
            Ok(Command::Repeat { body, condition })
        }
        Rule::proc_call => {
            let mut inner = pair.into_inner();
            let name = inner.next().unwrap().as_str().to_string();
            let args = inner
                .next()
                .unwrap()
                .into_inner()
                .map(|arg| arg.as_str().to_string())
                .collect();
            Ok(Command::Call { name, args, line })
        }
        Rule::read_stmt => {
            let target = build_identifier(pair.into_inner().next().unwrap())?;
            Ok(Command::Read { target, line })
        }
        Rule::write_stmt => {
            let value = build_value(pair.into_inner().next().unwrap())?;
            Ok(Command::Write { value, line })
        }
        _ => unreachable!("Unknown command rule: {:?}", pair.as_rule()),
    }
}

fn build_identifier(pair: Pair<Rule>) -> Result<Identifier> {
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_string();
    match inner.next() {
        None => Ok(Identifier::Scalar(name)),
        Some(index) => {
            let index = index.into_inner().next().unwrap();
            match index.as_rule() {
                Rule::num => Ok(Identifier::ArrayNum(name, build_num(index)?)),
                Rule::pid => Ok(Identifier::ArrayVar(name, index.as_str().to_string())),
                _ => unreachable!("Unknown index rule: {:?}", index.as_rule()),
            }
        }
    }
}

fn build_value(pair: Pair<Rule>) -> Result<Value> {
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::num => Ok(Value::Number(build_num(inner)?)),
        Rule::identifier => Ok(Value::Load(build_identifier(inner)?)),
        _ => unreachable!("Unknown value rule: {:?}", inner.as_rule()),
    }
}

fn build_expression(pair: Pair<Rule>) -> Result<Expression> {
    let mut inner = pair.into_inner();
    let lhs = build_value(inner.next().unwrap())?;
    match inner.next() {
        None => Ok(Expression::Single(lhs)),
        Some(op) => {
            let op = build_arith_op(&op);
            let rhs = build_value(inner.next().unwrap())?;
            Ok(Expression::Binary { op, lhs, rhs })
        }
    }
}

fn build_arith_op(pair: &Pair<Rule>) -> ArithOp {
    match pair.as_str() {
        "+" => ArithOp::Add,
        "-" => ArithOp::Sub,
        "*" => ArithOp::Mul,
        "/" => ArithOp::Div,
        "%" => ArithOp::Mod,
        other => unreachable!("Unknown arithmetic operator: {}", other),
    }
}

fn build_condition(pair: Pair<Rule>) -> Result<Condition> {
    let mut inner = pair.into_inner();
    let lhs = build_value(inner.next().unwrap())?;
    let op = match inner.next().unwrap().as_str() {
        "=" => RelOp::Eq,
        "!=" => RelOp::Neq,
        ">" => RelOp::Gt,
        "<" => RelOp::Lt,
        ">=" => RelOp::Geq,
        "<=" => RelOp::Leq,
        other => unreachable!("Unknown relational operator: {}", other),
    };
    let rhs = build_value(inner.next().unwrap())?;
    Ok(Condition { op, lhs, rhs })
}

fn build_num(pair: Pair<Rule>) -> Result<u64> {
    let line = line_of(&pair);
    let text = pair.as_str();
    let value = text
        .parse::<u64>()
        .map_err(|_| CompileError::Structural {
            line,
            reason: format!("Number literal too large: {}", text),
        })?;
    Ok(value)
}
