const REGISTRATION: &str = r#"if [ "$funcstack[1]" = "_pipewright" ]; then
    _pipewright "$@"
else
    compdef _pipewright pipewright
fi
"#;

const DYNAMIC_COMPLETIONS: &str = r#"

__pipewright_dynamic_tasks() {
    local prefix="$1"
    local file=""
    local total=${#words[@]}
    local idx=2
    local expect_value=0
    while (( idx <= total )); do
        local token="${words[idx]}"
        if (( expect_value )); then
            expect_value=0
            file="$token"
            ((idx++))
            continue
        fi
        case "$token" in
            -f|--file)
                expect_value=1
                ;;
        esac
        ((idx++))
    done
    local -a cmd
    cmd=("pipewright")
    if [[ -n "$file" ]]; then
        cmd+=("--file" "$file")
    fi
    cmd+=("complete-tasks" "$prefix")
    "${cmd[@]}" 2>/dev/null
}

__pipewright_describe_tasks() {
    local cur="$1"
    local -a dynamic described
    local candidate
    dynamic=( ${(f)"$(__pipewright_dynamic_tasks "$cur")"} )
    (( ${#dynamic[@]} )) || return 1
    described=()
    for candidate in "${dynamic[@]}"; do
        described+=("${candidate//:/\\:}:task")
    done
    _describe -t pipewright-tasks 'task, target or alias' described
}

_pipewright() {
    local cur="${words[CURRENT]}"
    local idx=2
    local total=${#words[@]}
    local expect_value=0
    local first_idx=0
    while (( idx <= total )); do
        local token="${words[idx]}"
        if (( expect_value )); then
            expect_value=0
            ((idx++))
            continue
        fi
        case "$token" in
            -f|--file|-e|--env)
                expect_value=1
                ;;
            -*)
                ;;
            *)
                first_idx=$idx
                break
                ;;
        esac
        ((idx++))
    done

    if (( first_idx == 0 || CURRENT == first_idx )); then
        case "$cur" in
            ""|-*|list|run|check|completions)
                ;;
            *)
                __pipewright_describe_tasks "$cur" && return 0
                ;;
        esac
    else
        case "${words[first_idx]}" in
            list|check|completions|help)
                ;;
            *)
                if [[ "$cur" != -* ]]; then
                    __pipewright_describe_tasks "$cur" && return 0
                fi
                ;;
        esac
    fi

    __pipewright_base "$@"
}

if [ "$funcstack[1]" = "_pipewright" ]; then
    _pipewright "$@"
else
    compdef _pipewright pipewright
fi
"#;

pub fn patch(mut script: String) -> String {
    if script.contains("_pipewright()") {
        script = script.replacen("_pipewright()", "__pipewright_base()", 1);
        script = script.replace(REGISTRATION, "");
        script.push_str(DYNAMIC_COMPLETIONS);
    }
    script
}
